//! Positions with trailing stops, and the closed-trade record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ohlcv::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub size: f64,
    pub initial_stop: f64,
    pub trailing_stop: f64,
    /// Equity the risk budget was measured against when the position opened.
    pub tradable_equity_at_entry: f64,
    pub entry_fee: f64,
    pub status: PositionStatus,
}

impl Position {
    pub fn open(
        symbol: impl Into<String>,
        side: Side,
        entry_price: f64,
        entry_time: DateTime<Utc>,
        size: f64,
        initial_stop: f64,
        tradable_equity_at_entry: f64,
        entry_fee: f64,
    ) -> Self {
        Position {
            symbol: symbol.into(),
            side,
            entry_price,
            entry_time,
            size,
            initial_stop,
            trailing_stop: initial_stop,
            tradable_equity_at_entry,
            entry_fee,
            status: PositionStatus::Open,
        }
    }

    /// Stop distance as a fraction of entry, kept constant while trailing.
    pub fn trail_fraction(&self) -> f64 {
        if self.entry_price > 0.0 {
            (self.entry_price - self.initial_stop).abs() / self.entry_price
        } else {
            0.0
        }
    }

    /// Amount lost if the initial stop is hit, before fees.
    pub fn initial_risk(&self) -> f64 {
        self.size * (self.entry_price - self.initial_stop).abs()
    }

    /// Moves the trailing stop toward the bar's favourable extreme. The stop
    /// is never loosened. Returns true if the stop moved.
    pub fn tighten_stop(&mut self, bar: &PriceBar) -> bool {
        let trail = self.trail_fraction();
        let candidate = match self.side {
            Side::Long => bar.high * (1.0 - trail),
            Side::Short => bar.low * (1.0 + trail),
        };
        let tighter = match self.side {
            Side::Long => candidate > self.trailing_stop,
            Side::Short => candidate < self.trailing_stop,
        };
        if tighter {
            self.trailing_stop = candidate;
        }
        tighter
    }

    pub fn stop_breached(&self, bar: &PriceBar) -> bool {
        match self.side {
            Side::Long => bar.low <= self.trailing_stop,
            Side::Short => bar.high >= self.trailing_stop,
        }
    }

    /// Cash value of the position at `price`. Shorts escrow their entry
    /// notional, so their value is the notional plus the open profit.
    pub fn market_value(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => self.size * price,
            Side::Short => self.size * self.entry_price + self.unrealized_pnl(price),
        }
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.sign() * self.size * (price - self.entry_price)
    }

    /// Closes the position into an immutable trade record.
    pub fn close(
        mut self,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        exit_reason: ExitReason,
        exit_fee: f64,
    ) -> Trade {
        let profit_amount = self.unrealized_pnl(exit_price) - self.entry_fee - exit_fee;
        let notional = self.size * self.entry_price;
        let profit_percentage = if notional > 0.0 {
            profit_amount / notional * 100.0
        } else {
            0.0
        };
        self.status = PositionStatus::Closed;
        Trade {
            position: self,
            exit_price,
            exit_time,
            exit_reason,
            profit_amount,
            profit_percentage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitReason {
    StopHit,
    SignalReversal,
    EndOfPeriod,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopHit => "stop-hit",
            ExitReason::SignalReversal => "signal-reversal",
            ExitReason::EndOfPeriod => "end-of-period",
        };
        f.write_str(s)
    }
}

/// A closed position. Read-only once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    position: Position,
    exit_price: f64,
    exit_time: DateTime<Utc>,
    exit_reason: ExitReason,
    profit_amount: f64,
    profit_percentage: f64,
}

impl Trade {
    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn symbol(&self) -> &str {
        &self.position.symbol
    }

    pub fn side(&self) -> Side {
        self.position.side
    }

    pub fn size(&self) -> f64 {
        self.position.size
    }

    pub fn entry_price(&self) -> f64 {
        self.position.entry_price
    }

    pub fn entry_time(&self) -> DateTime<Utc> {
        self.position.entry_time
    }

    pub fn initial_stop(&self) -> f64 {
        self.position.initial_stop
    }

    pub fn exit_price(&self) -> f64 {
        self.exit_price
    }

    pub fn exit_time(&self) -> DateTime<Utc> {
        self.exit_time
    }

    pub fn exit_reason(&self) -> ExitReason {
        self.exit_reason
    }

    pub fn profit_amount(&self) -> f64 {
        self.profit_amount
    }

    pub fn profit_percentage(&self) -> f64 {
        self.profit_percentage
    }
}
