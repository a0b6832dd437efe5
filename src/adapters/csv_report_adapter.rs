//! CSV report adapter.
//!
//! `write` produces three files from one output path `run.csv`:
//! the trade ledger at `run.csv`, the equity curve at `run_equity.csv`
//! and the statistics at `run_summary.json`.

use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::domain::error::GatetraderError;
use crate::domain::pipeline::BacktestResult;
use crate::domain::position::{ExitReason, Side};
use crate::ports::report_port::ReportPort;

#[derive(Serialize)]
struct TradeRow<'a> {
    symbol: &'a str,
    side: Side,
    size: f64,
    entry_time: String,
    entry_price: f64,
    initial_stop: f64,
    exit_time: String,
    exit_price: f64,
    exit_reason: ExitReason,
    profit_amount: f64,
    profit_percentage: f64,
}

#[derive(Serialize)]
struct EquityRow {
    time: String,
    total_equity: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }

    fn sibling(path: &Path, suffix: &str) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        path.with_file_name(format!("{}{}", stem, suffix))
    }

    pub fn equity_path(path: &Path) -> PathBuf {
        Self::sibling(path, "_equity.csv")
    }

    pub fn summary_path(path: &Path) -> PathBuf {
        Self::sibling(path, "_summary.json")
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &Path) -> Result<(), GatetraderError> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut ledger = csv::Writer::from_path(output_path)?;
        for trade in &result.trades {
            ledger.serialize(TradeRow {
                symbol: trade.symbol(),
                side: trade.side(),
                size: trade.size(),
                entry_time: trade.entry_time().to_rfc3339(),
                entry_price: trade.entry_price(),
                initial_stop: trade.initial_stop(),
                exit_time: trade.exit_time().to_rfc3339(),
                exit_price: trade.exit_price(),
                exit_reason: trade.exit_reason(),
                profit_amount: trade.profit_amount(),
                profit_percentage: trade.profit_percentage(),
            })?;
        }
        ledger.flush()?;

        let mut equity = csv::Writer::from_path(Self::equity_path(output_path))?;
        for point in &result.equity_curve {
            equity.serialize(EquityRow {
                time: point.time.to_rfc3339(),
                total_equity: point.total_equity,
            })?;
        }
        equity.flush()?;

        let mut summary = BufWriter::new(fs::File::create(Self::summary_path(output_path))?);
        serde_json::to_writer_pretty(&mut summary, &result.statistics)?;
        summary.flush()?;
        Ok(())
    }
}
