//! RSI + Bollinger confluence signals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::indicator::IndicatorSnapshot;
use super::position::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl Direction {
    /// Position side a fresh entry in this direction would open.
    pub fn entry_side(&self) -> Option<Side> {
        match self {
            Direction::Buy => Some(Side::Long),
            Direction::Sell => Some(Side::Short),
            Direction::Hold => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
            Direction::Hold => "HOLD",
        };
        f.write_str(s)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Direction::Buy),
            "SELL" => Ok(Direction::Sell),
            "HOLD" => Ok(Direction::Hold),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// A trading signal. Fields are read-only once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    time: DateTime<Utc>,
    symbol: String,
    direction: Direction,
    confidence: f64,
    reasoning: String,
}

impl Signal {
    /// Confidence is clipped to [0, 1]; NaN becomes 0.
    pub fn new(
        time: DateTime<Utc>,
        symbol: impl Into<String>,
        direction: Direction,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Signal {
            time,
            symbol: symbol.into(),
            direction,
            confidence,
            reasoning: reasoning.into(),
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }
}

/// What a signal means for a symbol given its current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Enter(Side),
    Exit,
    Hold,
}

/// Same-direction signals are ignored while a position is open; opposite
/// signals close it. Entries only happen from flat.
pub fn resolve_action(direction: Direction, open: Option<Side>) -> SignalAction {
    match (direction.entry_side(), open) {
        (None, _) => SignalAction::Hold,
        (Some(side), None) => SignalAction::Enter(side),
        (Some(side), Some(current)) if side == current => SignalAction::Hold,
        (Some(_), Some(_)) => SignalAction::Exit,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalParams {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
}

impl Default for SignalParams {
    fn default() -> Self {
        SignalParams {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignalGenerator {
    params: SignalParams,
}

impl SignalGenerator {
    pub fn new(params: SignalParams) -> Self {
        SignalGenerator { params }
    }

    pub fn params(&self) -> &SignalParams {
        &self.params
    }

    /// Both RSI and the band must agree before a BUY or SELL is emitted.
    pub fn generate(&self, symbol: &str, snapshot: &IndicatorSnapshot, close: f64) -> Signal {
        let p = &self.params;
        let rsi = snapshot.rsi;

        if rsi < p.rsi_oversold && close <= snapshot.bb_lower {
            let confidence = (p.rsi_oversold - rsi) / p.rsi_oversold.max(f64::EPSILON);
            return Signal::new(
                snapshot.time,
                symbol,
                Direction::Buy,
                confidence,
                format!(
                    "RSI {:.1} below {:.0} and close {:.2} at or under lower band {:.2}",
                    rsi, p.rsi_oversold, close, snapshot.bb_lower
                ),
            );
        }

        if rsi > p.rsi_overbought && close >= snapshot.bb_upper {
            let confidence = (rsi - p.rsi_overbought) / (100.0 - p.rsi_overbought).max(f64::EPSILON);
            return Signal::new(
                snapshot.time,
                symbol,
                Direction::Sell,
                confidence,
                format!(
                    "RSI {:.1} above {:.0} and close {:.2} at or over upper band {:.2}",
                    rsi, p.rsi_overbought, close, snapshot.bb_upper
                ),
            );
        }

        Signal::new(
            snapshot.time,
            symbol,
            Direction::Hold,
            0.0,
            format!(
                "no confluence: RSI {:.1}, band position {:.2}",
                rsi,
                snapshot.band_position(close)
            ),
        )
    }
}

/// Merges a rule-based signal with a second source (e.g. a model
/// prediction). Directions must agree; anything else is HOLD.
pub fn merge_signals(primary: &Signal, secondary: &Signal) -> Signal {
    let agree = primary.direction() == secondary.direction()
        && primary.direction() != Direction::Hold;

    if agree {
        Signal::new(
            primary.time().max(secondary.time()),
            primary.symbol(),
            primary.direction(),
            (primary.confidence() + secondary.confidence()) / 2.0,
            format!("{}; confirmed by: {}", primary.reasoning(), secondary.reasoning()),
        )
    } else {
        Signal::new(
            primary.time().max(secondary.time()),
            primary.symbol(),
            Direction::Hold,
            0.0,
            format!(
                "sources disagree ({} vs {})",
                primary.direction(),
                secondary.direction()
            ),
        )
    }
}
