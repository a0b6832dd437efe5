//! Performance statistics for a backtest run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::portfolio::EquityPoint;
use super::position::Trade;

const SECONDS_PER_DAY: f64 = 86_400.0;
const DAYS_PER_MONTH: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Classifies a max drawdown given in percent.
    pub fn from_drawdown(max_drawdown_pct: f64) -> Self {
        if max_drawdown_pct < 10.0 {
            RiskLevel::Low
        } else if max_drawdown_pct < 20.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub total_profit: f64,
    /// Percent of initial capital.
    pub total_percentage: f64,
    pub final_equity: f64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    /// Fraction in [0, 1].
    pub win_rate: f64,
    /// Percent below the running equity peak.
    pub max_drawdown: f64,
    pub days_tested: f64,
    pub monthly_profit: f64,
    pub monthly_target: f64,
    /// Percent of the monthly target.
    pub target_achievement: f64,
    pub risk_level: RiskLevel,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

/// Turns a trade ledger and equity curve into a [`PerformanceReport`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceAnalyzer;

impl PerformanceAnalyzer {
    pub fn analyze(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        monthly_target: f64,
    ) -> PerformanceReport {
        let total_profit: f64 = trades.iter().map(|t| t.profit_amount()).sum();
        let total_percentage = if initial_capital > 0.0 {
            total_profit / initial_capital * 100.0
        } else {
            0.0
        };
        let final_equity = equity_curve
            .last()
            .map(|p| p.total_equity)
            .unwrap_or(initial_capital);

        let stats = TradeStats::from_trades(trades);
        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            stats.won as f64 / total_trades as f64
        } else {
            0.0
        };

        let max_drawdown = max_drawdown_pct(equity_curve);
        let days_tested = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) => days_between(first.time, last.time),
            _ => 0.0,
        };
        let monthly_profit = if days_tested > 0.0 {
            total_profit / days_tested * DAYS_PER_MONTH
        } else {
            0.0
        };
        let target_achievement = if monthly_target > 0.0 {
            monthly_profit / monthly_target * 100.0
        } else {
            0.0
        };

        PerformanceReport {
            total_profit,
            total_percentage,
            final_equity,
            total_trades,
            trades_won: stats.won,
            trades_lost: stats.lost,
            trades_breakeven: stats.breakeven,
            win_rate,
            max_drawdown,
            days_tested,
            monthly_profit,
            monthly_target,
            target_achievement,
            risk_level: RiskLevel::from_drawdown(max_drawdown),
            profit_factor: stats.profit_factor(),
            avg_win: stats.avg_win(),
            avg_loss: stats.avg_loss(),
            largest_win: stats.largest_win,
            largest_loss: stats.largest_loss,
        }
    }
}

#[derive(Debug, Default)]
struct TradeStats {
    won: usize,
    lost: usize,
    breakeven: usize,
    total_wins: f64,
    total_losses: f64,
    largest_win: f64,
    largest_loss: f64,
}

impl TradeStats {
    fn from_trades(trades: &[Trade]) -> Self {
        let mut stats = TradeStats::default();
        for trade in trades {
            let pnl = trade.profit_amount();
            if pnl > 0.0 {
                stats.won += 1;
                stats.total_wins += pnl;
                stats.largest_win = stats.largest_win.max(pnl);
            } else if pnl < 0.0 {
                stats.lost += 1;
                stats.total_losses += pnl.abs();
                stats.largest_loss = stats.largest_loss.max(pnl.abs());
            } else {
                stats.breakeven += 1;
            }
        }
        stats
    }

    fn profit_factor(&self) -> f64 {
        if self.total_losses > 0.0 {
            self.total_wins / self.total_losses
        } else if self.total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }

    fn avg_win(&self) -> f64 {
        if self.won > 0 {
            self.total_wins / self.won as f64
        } else {
            0.0
        }
    }

    fn avg_loss(&self) -> f64 {
        if self.lost > 0 {
            self.total_losses / self.lost as f64
        } else {
            0.0
        }
    }
}

fn days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    ((end - start).num_seconds() as f64 / SECONDS_PER_DAY).max(0.0)
}

/// Largest decline from a running peak, in percent.
fn max_drawdown_pct(equity_curve: &[EquityPoint]) -> f64 {
    let Some(first) = equity_curve.first() else {
        return 0.0;
    };

    let mut peak = first.total_equity;
    let mut max_dd = 0.0_f64;
    for point in equity_curve {
        if point.total_equity > peak {
            peak = point.total_equity;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.total_equity) / peak * 100.0);
        }
    }
    max_dd
}
