//! Fetch -> backtest -> analyze for one symbol.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::backtest::{BacktestEngine, BacktestParams};
use super::error::GatetraderError;
use super::metrics::{PerformanceAnalyzer, PerformanceReport};
use super::ohlcv::{quote_asset, Timeframe};
use super::portfolio::EquityPoint;
use super::position::Trade;
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub days_back: u32,
    pub initial_capital: f64,
    pub risk_per_trade: f64,
    pub monthly_target: f64,
    /// Quote-currency amount held back from trading.
    pub protected_reserve: f64,
    /// End of the test window.
    pub as_of: DateTime<Utc>,
}

impl BacktestRequest {
    /// Window start.
    pub fn since(&self) -> DateTime<Utc> {
        self.as_of - Duration::days(i64::from(self.days_back))
    }

    /// Bars covering `days_back` days inclusive of both ends.
    pub fn bar_limit(&self) -> usize {
        self.days_back as usize * self.timeframe.bars_per_day() + 1
    }

    /// The same request for another symbol.
    pub fn for_symbol(&self, symbol: &str) -> Self {
        BacktestRequest {
            symbol: symbol.to_string(),
            ..self.clone()
        }
    }

    /// `base` with this request's capital, risk fraction and reserve applied.
    pub fn params(&self, base: &BacktestParams) -> BacktestParams {
        let mut params = base.clone();
        params.initial_capital = self.initial_capital;
        params.risk.max_risk_fraction_per_trade = self.risk_per_trade;
        if self.protected_reserve > 0.0 {
            let asset = quote_asset(&self.symbol).unwrap_or("CASH");
            params
                .risk
                .protected_reserves
                .insert(asset.to_string(), self.protected_reserve);
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub parameters: BacktestParams,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub statistics: PerformanceReport,
}

pub fn run_backtest(
    data: &dyn DataPort,
    request: &BacktestRequest,
    base: &BacktestParams,
) -> Result<BacktestResult, GatetraderError> {
    let bars = data.get_ohlcv(
        &request.symbol,
        request.timeframe,
        request.since(),
        request.bar_limit(),
    )?;
    if bars.is_empty() {
        return Err(GatetraderError::NoData {
            symbol: request.symbol.clone(),
        });
    }

    let parameters = request.params(base);
    let run = BacktestEngine::new(parameters.clone()).run(&request.symbol, &bars)?;
    let statistics = PerformanceAnalyzer::analyze(
        &run.trades,
        &run.equity_curve,
        run.initial_capital,
        request.monthly_target,
    );

    info!(
        symbol = %request.symbol,
        trades = statistics.total_trades,
        total_profit = statistics.total_profit,
        max_drawdown = statistics.max_drawdown,
        risk_level = %statistics.risk_level,
        "backtest analyzed"
    );

    Ok(BacktestResult {
        symbol: request.symbol.clone(),
        timeframe: request.timeframe,
        parameters,
        trades: run.trades,
        equity_curve: run.equity_curve,
        statistics,
    })
}
