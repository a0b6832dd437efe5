//! CSV file market data adapter.
//!
//! One file per symbol and timeframe, `<BASE>_<QUOTE>_<timeframe>.csv`, with
//! a `timestamp,open,high,low,close,volume` header and RFC 3339 timestamps.
//! Rows are returned in file order; ordering is checked by the engine.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::domain::error::GatetraderError;
use crate::domain::ohlcv::{PriceBar, Timeframe};
use crate::ports::data_port::DataPort;

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn file_stem(symbol: &str) -> String {
        symbol.replace('/', "_")
    }

    pub fn csv_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", Self::file_stem(symbol), timeframe))
    }
}

impl DataPort for CsvAdapter {
    fn get_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PriceBar>, GatetraderError> {
        let path = self.csv_path(symbol, timeframe);
        if !path.exists() {
            return Err(GatetraderError::NoData {
                symbol: symbol.to_string(),
            });
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let mut bars = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let row = row?;
            if row.timestamp < since {
                continue;
            }
            bars.push(PriceBar {
                symbol: symbol.to_string(),
                timeframe,
                open_time: row.timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
            if bars.len() == limit {
                break;
            }
        }
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, GatetraderError> {
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            let Some(stem) = name.strip_suffix(".csv") else {
                continue;
            };
            let parts: Vec<&str> = stem.split('_').collect();
            if let [base, quote, _timeframe] = parts.as_slice() {
                let symbol = format!("{}/{}", base, quote);
                if !symbols.contains(&symbol) {
                    symbols.push(symbol);
                }
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

/// Writes bars in the format [`CsvAdapter`] reads.
pub fn write_bars(path: &std::path::Path, bars: &[PriceBar]) -> Result<(), GatetraderError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for bar in bars {
        writer.write_record([
            bar.open_time.to_rfc3339(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
