//! Simulated cash ledger, trade ledger and equity curve for one run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::{Position, Side, Trade};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub time: DateTime<Utc>,
    pub total_equity: f64,
}

/// Cash plus the append-only records of a run. Open positions live in the
/// engine state; the portfolio only sees their cash effects.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    /// Debits the entry notional and fee. Shorts escrow their notional.
    pub fn settle_entry(&mut self, position: &Position) {
        self.cash -= position.size * position.entry_price + position.entry_fee;
    }

    /// Credits the exit proceeds and records the trade.
    pub fn settle_exit(&mut self, trade: Trade, exit_fee: f64) {
        let proceeds = match trade.side() {
            Side::Long => trade.size() * trade.exit_price(),
            Side::Short => trade.position().market_value(trade.exit_price()),
        };
        self.cash += proceeds - exit_fee;
        self.trades.push(trade);
    }

    /// Appends an equity point. Points must arrive in time order; a point
    /// that does not move time forward is dropped.
    pub fn record_equity(&mut self, time: DateTime<Utc>, total_equity: f64) -> bool {
        if self.equity_curve.last().is_some_and(|p| p.time >= time) {
            return false;
        }
        self.equity_curve.push(EquityPoint { time, total_equity });
        true
    }

    /// Cash plus the mark-to-market value of `open` at `price`.
    pub fn total_equity(&self, open: Option<&Position>, price: f64) -> f64 {
        self.cash + open.map(|p| p.market_value(price)).unwrap_or(0.0)
    }

    pub fn into_records(self) -> (Vec<Trade>, Vec<EquityPoint>) {
        (self.trades, self.equity_curve)
    }
}
