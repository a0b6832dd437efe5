//! Bar-by-bar backtest engine.
//!
//! The loop is a state machine per symbol: `Flat -> Open -> Flat ... -> Terminal`.
//! Transitions are pure functions of the current state, the bar, its signal and
//! a read-only view of the account; the engine applies the resulting fills to
//! the [`Portfolio`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::GatetraderError;
use super::execution::ExecutionConfig;
use super::indicator::{IndicatorEngine, IndicatorParams, IndicatorSnapshot};
use super::ohlcv::{quote_asset, validate_bars, PriceBar};
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{ExitReason, Position, Side, Trade};
use super::risk::{floor_to_lot, size_position, AssetBalance, Holdings, RiskPolicy};
use super::signal::{resolve_action, Signal, SignalAction, SignalGenerator, SignalParams};

/// Everything a run needs besides the bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestParams {
    pub initial_capital: f64,
    pub indicators: IndicatorParams,
    pub signals: SignalParams,
    pub risk: RiskPolicy,
    pub execution: ExecutionConfig,
}

impl Default for BacktestParams {
    fn default() -> Self {
        BacktestParams {
            initial_capital: 10_000.0,
            indicators: IndicatorParams::default(),
            signals: SignalParams::default(),
            risk: RiskPolicy::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineState {
    Flat,
    Open(Position),
    Terminal,
}

impl EngineState {
    pub fn position(&self) -> Option<&Position> {
        match self {
            EngineState::Open(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Terminal)
    }
}

/// Cash effect of a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Entry(Position),
    Exit { trade: Trade, exit_fee: f64 },
}

/// Read-only account view used for entry sizing.
#[derive(Debug, Clone)]
pub struct Desk<'a> {
    pub cash: f64,
    pub open_positions: usize,
    pub risk: &'a RiskPolicy,
    pub execution: &'a ExecutionConfig,
}

impl Desk<'_> {
    /// Holdings for sizing while flat: all equity sits in the quote asset.
    fn holdings(&self, symbol: &str) -> Holdings {
        let mut holdings = Holdings::new();
        let asset = quote_asset(symbol).unwrap_or("CASH");
        holdings.insert(
            asset.to_string(),
            AssetBalance {
                quantity: self.cash,
                price: 1.0,
            },
        );
        holdings
    }
}

fn exit(
    position: Position,
    market_price: f64,
    time: DateTime<Utc>,
    reason: ExitReason,
    execution: &ExecutionConfig,
) -> Fill {
    let price = execution.exit_price(position.side, market_price);
    let exit_fee = execution.commission(position.size * price);
    let trade = position.close(price, time, reason, exit_fee);
    Fill::Exit { trade, exit_fee }
}

/// Sizes an entry at the bar close. `None` means the bar is treated as HOLD.
fn enter(bar: &PriceBar, side: Side, desk: &Desk<'_>) -> Option<Position> {
    let entry_price = desk.execution.entry_price(side, bar.close);
    let stop = desk.risk.implied_stop(entry_price, side);
    let holdings = desk.holdings(&bar.symbol);

    let sized = match size_position(desk.cash, desk.risk, entry_price, stop, &bar.symbol, &holdings) {
        Ok(s) => s,
        Err(e) => {
            warn!(symbol = %bar.symbol, time = %bar.open_time, error = %e, "sizing failed, holding");
            return None;
        }
    };

    // The fee must fit in the same budget as the notional.
    let mut size = sized.size;
    let rate = desk.execution.commission_rate();
    if size * entry_price * (1.0 + rate) > sized.tradable_equity {
        size = floor_to_lot(
            sized.tradable_equity / (entry_price * (1.0 + rate)),
            desk.risk.lot_step,
        );
    }
    if size <= 0.0 {
        warn!(symbol = %bar.symbol, time = %bar.open_time, "size after fees rounds to zero, holding");
        return None;
    }

    let fee = desk.execution.commission(size * entry_price);
    Some(Position::open(
        bar.symbol.clone(),
        side,
        entry_price,
        bar.open_time,
        size,
        stop,
        sized.tradable_equity,
        fee,
    ))
}

/// One bar of the state machine.
pub fn on_bar(
    state: EngineState,
    bar: &PriceBar,
    signal: Option<&Signal>,
    desk: &Desk<'_>,
) -> (EngineState, Option<Fill>) {
    match state {
        EngineState::Terminal => (EngineState::Terminal, None),
        EngineState::Open(mut position) => {
            position.tighten_stop(bar);
            if position.stop_breached(bar) {
                let stop = position.trailing_stop;
                return (
                    EngineState::Flat,
                    Some(exit(position, stop, bar.open_time, ExitReason::StopHit, desk.execution)),
                );
            }

            let direction = signal.map(|s| s.direction());
            match direction.map(|d| resolve_action(d, Some(position.side))) {
                Some(SignalAction::Exit) => (
                    EngineState::Flat,
                    Some(exit(
                        position,
                        bar.close,
                        bar.open_time,
                        ExitReason::SignalReversal,
                        desk.execution,
                    )),
                ),
                _ => (EngineState::Open(position), None),
            }
        }
        EngineState::Flat => {
            let Some(signal) = signal else {
                return (EngineState::Flat, None);
            };
            let side = match resolve_action(signal.direction(), None) {
                SignalAction::Enter(side) => side,
                _ => return (EngineState::Flat, None),
            };
            if side == Side::Short && !desk.execution.allow_shorting {
                return (EngineState::Flat, None);
            }
            if desk.open_positions >= desk.risk.max_concurrent_positions {
                debug!(symbol = %bar.symbol, "position capacity reached, holding");
                return (EngineState::Flat, None);
            }
            match enter(bar, side, desk) {
                Some(position) => (EngineState::Open(position.clone()), Some(Fill::Entry(position))),
                None => (EngineState::Flat, None),
            }
        }
    }
}

/// Closes any open position at `bar`'s close and ends the run.
pub fn finish(state: EngineState, bar: &PriceBar, execution: &ExecutionConfig) -> (EngineState, Option<Fill>) {
    match state {
        EngineState::Open(position) => (
            EngineState::Terminal,
            Some(exit(position, bar.close, bar.open_time, ExitReason::EndOfPeriod, execution)),
        ),
        _ => (EngineState::Terminal, None),
    }
}

/// Ledger and curve produced by one run.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRun {
    pub symbol: String,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

#[derive(Debug, Clone)]
pub struct BacktestEngine {
    params: BacktestParams,
    indicators: IndicatorEngine,
    signals: SignalGenerator,
}

impl BacktestEngine {
    pub fn new(params: BacktestParams) -> Self {
        BacktestEngine {
            indicators: IndicatorEngine::new(params.indicators.clone()),
            signals: SignalGenerator::new(params.signals.clone()),
            params,
        }
    }

    pub fn params(&self) -> &BacktestParams {
        &self.params
    }

    /// Runs the strategy over `bars`. The whole sequence is validated before
    /// the first bar is processed.
    pub fn run(&self, symbol: &str, bars: &[PriceBar]) -> Result<BacktestRun, GatetraderError> {
        if bars.is_empty() {
            return Err(GatetraderError::NoData {
                symbol: symbol.to_string(),
            });
        }
        validate_bars(symbol, bars)?;
        let snapshots = self.indicators.compute(bars)?;
        let first_index = snapshots.first().map(|s| s.bar_index).unwrap_or(bars.len());
        let snapshot_at = |i: usize| -> Option<&IndicatorSnapshot> {
            i.checked_sub(first_index).and_then(|k| snapshots.get(k))
        };

        let mut portfolio = Portfolio::new(self.params.initial_capital);
        let mut state = EngineState::Flat;
        let last = bars.len() - 1;

        for (i, bar) in bars.iter().enumerate() {
            let signal = snapshot_at(i).map(|s| self.signals.generate(symbol, s, bar.close));
            let desk = Desk {
                cash: portfolio.cash,
                open_positions: usize::from(state.position().is_some()),
                risk: &self.params.risk,
                execution: &self.params.execution,
            };

            let (next, fill) = on_bar(state, bar, signal.as_ref(), &desk);
            state = next;
            apply(&mut portfolio, fill);

            if i == last {
                let (next, fill) = finish(state, bar, &self.params.execution);
                state = next;
                apply(&mut portfolio, fill);
            }

            let equity = portfolio.total_equity(state.position(), bar.close);
            portfolio.record_equity(bar.open_time, equity);
        }

        let final_equity = portfolio.cash;
        let (trades, equity_curve) = portfolio.into_records();
        info!(
            symbol,
            bars = bars.len(),
            trades = trades.len(),
            final_equity,
            "backtest complete"
        );

        Ok(BacktestRun {
            symbol: symbol.to_string(),
            initial_capital: self.params.initial_capital,
            final_equity,
            trades,
            equity_curve,
        })
    }
}

fn apply(portfolio: &mut Portfolio, fill: Option<Fill>) {
    match fill {
        Some(Fill::Entry(position)) => {
            debug!(
                symbol = %position.symbol,
                side = ?position.side,
                price = position.entry_price,
                size = position.size,
                stop = position.initial_stop,
                "flat -> open"
            );
            portfolio.settle_entry(&position);
        }
        Some(Fill::Exit { trade, exit_fee }) => {
            debug!(
                symbol = %trade.symbol(),
                reason = %trade.exit_reason(),
                price = trade.exit_price(),
                profit = trade.profit_amount(),
                "open -> flat"
            );
            portfolio.settle_exit(trade, exit_fee);
        }
        None => {}
    }
}
