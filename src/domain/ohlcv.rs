//! OHLCV price bars and timeframes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::GatetraderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl Timeframe {
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::OneMinute => Duration::minutes(1),
            Timeframe::FiveMinutes => Duration::minutes(5),
            Timeframe::FifteenMinutes => Duration::minutes(15),
            Timeframe::OneHour => Duration::hours(1),
            Timeframe::FourHours => Duration::hours(4),
            Timeframe::OneDay => Duration::days(1),
        }
    }

    pub fn bars_per_day(&self) -> usize {
        (Duration::days(1).num_seconds() / self.duration().num_seconds()) as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHours => "4h",
            Timeframe::OneDay => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(Timeframe::OneMinute),
            "5m" => Ok(Timeframe::FiveMinutes),
            "15m" => Ok(Timeframe::FifteenMinutes),
            "1h" => Ok(Timeframe::OneHour),
            "4h" => Ok(Timeframe::FourHours),
            "1d" => Ok(Timeframe::OneDay),
            other => Err(format!("unsupported timeframe '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Base asset of a `BASE/QUOTE` pair. Symbols without a separator are
/// treated as the base asset itself.
pub fn base_asset(symbol: &str) -> &str {
    symbol.split('/').next().unwrap_or(symbol)
}

/// Quote asset of a `BASE/QUOTE` pair, if any.
pub fn quote_asset(symbol: &str) -> Option<&str> {
    symbol.split_once('/').map(|(_, quote)| quote)
}

/// Checks that a bar sequence belongs to one symbol and has strictly
/// increasing timestamps. Bars are never reordered.
pub fn validate_bars(symbol: &str, bars: &[PriceBar]) -> Result<(), GatetraderError> {
    for (index, bar) in bars.iter().enumerate() {
        if bar.symbol != symbol {
            return Err(GatetraderError::BarValidation {
                symbol: symbol.to_string(),
                index,
                reason: format!("bar belongs to {}", bar.symbol),
            });
        }
        let prices = [bar.open, bar.high, bar.low, bar.close];
        let in_range = |p: f64| bar.low <= p && p <= bar.high;
        if prices.iter().any(|p| !p.is_finite())
            || bar.close <= 0.0
            || !in_range(bar.open)
            || !in_range(bar.close)
        {
            return Err(GatetraderError::BarValidation {
                symbol: symbol.to_string(),
                index,
                reason: format!(
                    "malformed bar (open {}, high {}, low {}, close {})",
                    bar.open, bar.high, bar.low, bar.close
                ),
            });
        }
        if index > 0 {
            let previous = bars[index - 1].open_time;
            if bar.open_time <= previous {
                return Err(GatetraderError::BarValidation {
                    symbol: symbol.to_string(),
                    index,
                    reason: format!(
                        "timestamp {} does not follow {}",
                        bar.open_time, previous
                    ),
                });
            }
        }
    }
    Ok(())
}
