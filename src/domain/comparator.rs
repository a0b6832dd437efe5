//! Parallel multi-symbol comparison.

use rayon::prelude::*;
use tracing::warn;

use super::backtest::BacktestParams;
use super::error::GatetraderError;
use super::pipeline::{run_backtest, BacktestRequest, BacktestResult};
use crate::ports::data_port::DataPort;

#[derive(Debug)]
pub struct ComparisonRow {
    pub symbol: String,
    pub result: Result<BacktestResult, GatetraderError>,
}

#[derive(Debug)]
pub struct Comparison {
    /// One row per requested symbol, in request order.
    pub rows: Vec<ComparisonRow>,
    /// Successful symbol with the highest total profit.
    pub best: Option<String>,
}

impl Comparison {
    pub fn best_result(&self) -> Option<&BacktestResult> {
        let best = self.best.as_deref()?;
        self.rows
            .iter()
            .find(|row| row.symbol == best)
            .and_then(|row| row.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &GatetraderError)> {
        self.rows
            .iter()
            .filter_map(|row| row.result.as_ref().err().map(|e| (row.symbol.as_str(), e)))
    }
}

/// Runs `template` for each symbol on the rayon pool. Each run owns its state;
/// a failing symbol becomes an error row.
pub fn run_multi_pair(
    data: &dyn DataPort,
    symbols: &[String],
    template: &BacktestRequest,
    params: &BacktestParams,
) -> Comparison {
    let rows: Vec<ComparisonRow> = symbols
        .par_iter()
        .map(|symbol| {
            let result = run_backtest(data, &template.for_symbol(symbol), params);
            if let Err(e) = &result {
                warn!(symbol = %symbol, error = %e, "symbol failed, continuing");
            }
            ComparisonRow {
                symbol: symbol.clone(),
                result,
            }
        })
        .collect();

    let mut best: Option<(&str, f64)> = None;
    for row in &rows {
        if let Ok(result) = &row.result {
            let profit = result.statistics.total_profit;
            if best.is_none_or(|(_, top)| profit > top) {
                best = Some((&row.symbol, profit));
            }
        }
    }
    let best = best.map(|(symbol, _)| symbol.to_string());

    Comparison { rows, best }
}
