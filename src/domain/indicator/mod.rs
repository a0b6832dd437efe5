//! Technical indicators and the snapshot engine.
//!
//! Each calculator returns an `IndicatorSeries` parallel to its input bars,
//! flagging warm-up points as invalid. `IndicatorEngine` zips the RSI,
//! Bollinger and moving-average series into one `IndicatorSnapshot` per bar
//! once every series is valid. All calculators are causal: the value at bar
//! `i` only reads bars `0..=i`.

pub mod bollinger;
pub mod rsi;
pub mod sma;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::GatetraderError;
use crate::domain::ohlcv::PriceBar;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub time: DateTime<Utc>,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Bollinger { upper: f64, middle: f64, lower: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Rsi(usize),
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    fn simple_at(&self, index: usize) -> Option<f64> {
        match self.values.get(index) {
            Some(IndicatorPoint {
                valid: true,
                value: IndicatorValue::Simple(v),
                ..
            }) => Some(*v),
            _ => None,
        }
    }

    fn bands_at(&self, index: usize) -> Option<(f64, f64, f64)> {
        match self.values.get(index) {
            Some(IndicatorPoint {
                valid: true,
                value:
                    IndicatorValue::Bollinger {
                        upper,
                        middle,
                        lower,
                    },
                ..
            }) => Some((*upper, *middle, *lower)),
            _ => None,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

/// Indicator values for one bar, computed from that bar and its history only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub time: DateTime<Utc>,
    /// Position of the bar in the series the snapshot was computed from.
    pub bar_index: usize,
    pub rsi: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub ma_short: f64,
    pub ma_long: f64,
}

impl IndicatorSnapshot {
    /// Signed distance of `price` from the lower band in band widths.
    /// Zero when the bands have collapsed onto the moving average.
    pub fn band_position(&self, price: f64) -> f64 {
        let width = self.bb_upper - self.bb_lower;
        if width <= f64::EPSILON {
            0.0
        } else {
            (price - self.bb_lower) / width
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub bollinger_period: usize,
    pub bollinger_mult_x100: u32,
    pub ma_short_period: usize,
    pub ma_long_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            rsi_period: 14,
            bollinger_period: 20,
            bollinger_mult_x100: 200,
            ma_short_period: 10,
            ma_long_period: 30,
        }
    }
}

impl IndicatorParams {
    /// Minimum number of bars before the first snapshot can be produced.
    pub fn min_lookback(&self) -> usize {
        (self.rsi_period + 1)
            .max(self.bollinger_period)
            .max(self.ma_short_period)
            .max(self.ma_long_period)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    params: IndicatorParams,
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams) -> Self {
        IndicatorEngine { params }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    pub fn min_lookback(&self) -> usize {
        self.params.min_lookback()
    }

    /// Computes one snapshot per bar after warm-up. The output is shorter
    /// than the input by `min_lookback() - 1` entries.
    pub fn compute(&self, bars: &[PriceBar]) -> Result<Vec<IndicatorSnapshot>, GatetraderError> {
        let minimum = self.min_lookback();
        if bars.len() < minimum {
            return Err(GatetraderError::InsufficientData {
                symbol: bars.first().map(|b| b.symbol.clone()).unwrap_or_default(),
                bars: bars.len(),
                minimum,
            });
        }

        let p = &self.params;
        let rsi = rsi::calculate_rsi(bars, p.rsi_period);
        let bands = bollinger::calculate_bollinger(bars, p.bollinger_period, p.bollinger_mult_x100);
        let short = sma::calculate_sma(bars, p.ma_short_period);
        let long = sma::calculate_sma(bars, p.ma_long_period);

        let snapshots = bars
            .iter()
            .enumerate()
            .skip(minimum.saturating_sub(1))
            .filter_map(|(i, bar)| {
                let rsi = rsi.simple_at(i)?;
                let (bb_upper, bb_middle, bb_lower) = bands.bands_at(i)?;
                Some(IndicatorSnapshot {
                    time: bar.open_time,
                    bar_index: i,
                    rsi,
                    bb_upper,
                    bb_middle,
                    bb_lower,
                    ma_short: short.simple_at(i)?,
                    ma_long: long.simple_at(i)?,
                })
            })
            .collect();

        Ok(snapshots)
    }
}
