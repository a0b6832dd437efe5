//! Fill simulation at bar prices: slippage and percentage commission.

use serde::{Deserialize, Serialize};

use super::position::Side;

/// Execution cost parameters. Percentages are in percent units (0.1 = 0.1%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub allow_shorting: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_pct: 0.0,
            slippage_pct: 0.0,
            allow_shorting: false,
        }
    }
}

impl ExecutionConfig {
    /// Commission charged on a fill of `trade_value`.
    pub fn commission(&self, trade_value: f64) -> f64 {
        trade_value.abs() * self.commission_pct / 100.0
    }

    /// Entry fill price. Slippage always works against the trader: longs
    /// buy higher, shorts sell lower.
    pub fn entry_price(&self, side: Side, market_price: f64) -> f64 {
        match side {
            Side::Long => market_price * (1.0 + self.slippage_pct / 100.0),
            Side::Short => market_price * (1.0 - self.slippage_pct / 100.0),
        }
    }

    /// Exit fill price: longs sell lower, shorts cover higher.
    pub fn exit_price(&self, side: Side, market_price: f64) -> f64 {
        match side {
            Side::Long => market_price * (1.0 - self.slippage_pct / 100.0),
            Side::Short => market_price * (1.0 + self.slippage_pct / 100.0),
        }
    }

    /// Fraction of notional consumed by commission, for sizing against cash.
    pub fn commission_rate(&self) -> f64 {
        self.commission_pct / 100.0
    }
}
