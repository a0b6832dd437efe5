//! Profit targets for the live gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::GatetraderError;

const DAYS_PER_MONTH: f64 = 30.0;
const DAYS_PER_WEEK: f64 = 7.0;

/// Monthly, weekly and daily profit goals. Changed only through [`Target::update`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    monthly: f64,
    weekly: f64,
    daily: f64,
    updated_at: DateTime<Utc>,
}

fn check_positive(name: &str, value: f64) -> Result<(), GatetraderError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GatetraderError::InvalidTarget {
            reason: format!("{} target must be positive, got {}", name, value),
        })
    }
}

impl Target {
    pub fn new(
        monthly: f64,
        weekly: f64,
        daily: f64,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, GatetraderError> {
        check_positive("monthly", monthly)?;
        check_positive("weekly", weekly)?;
        check_positive("daily", daily)?;
        Ok(Target {
            monthly,
            weekly,
            daily,
            updated_at,
        })
    }

    /// Derives weekly and daily goals pro rata from a 30-day month.
    pub fn from_monthly(monthly: f64, updated_at: DateTime<Utc>) -> Result<Self, GatetraderError> {
        Target::new(
            monthly,
            monthly * DAYS_PER_WEEK / DAYS_PER_MONTH,
            monthly / DAYS_PER_MONTH,
            updated_at,
        )
    }

    /// Replaces all three goals. On error the target is left unchanged.
    pub fn update(
        &mut self,
        monthly: f64,
        weekly: f64,
        daily: f64,
        updated_at: DateTime<Utc>,
    ) -> Result<(), GatetraderError> {
        *self = Target::new(monthly, weekly, daily, updated_at)?;
        Ok(())
    }

    pub fn monthly(&self) -> f64 {
        self.monthly
    }

    pub fn weekly(&self) -> f64 {
        self.weekly
    }

    pub fn daily(&self) -> f64 {
        self.daily
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
