//! Simple moving average of closes.
//!
//! SMA(n)[i] = sum(C[i-j] for j in 0..n) / n, maintained as a running sum.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_sma(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mut running = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        running += bar.close;
        if period > 0 && i >= period {
            running -= bars[i - period].close;
        }

        let valid = period > 0 && i + 1 >= period;
        values.push(IndicatorPoint {
            time: bar.open_time,
            valid,
            value: IndicatorValue::Simple(if valid { running / period as f64 } else { 0.0 }),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}
