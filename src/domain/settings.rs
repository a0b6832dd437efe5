//! Typed settings assembled from a validated [`ConfigPort`].

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::path::PathBuf;

use crate::domain::backtest::BacktestParams;
use crate::domain::config_validation::{
    parse_reserves, validate_backtest_config, validate_decision_config, validate_risk_config,
    validate_strategy_config, validate_target_config,
};
use crate::domain::decision::DecisionPolicy;
use crate::domain::error::GatetraderError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::indicator::IndicatorParams;
use crate::domain::ohlcv::Timeframe;
use crate::domain::pipeline::BacktestRequest;
use crate::domain::risk::RiskPolicy;
use crate::domain::signal::SignalParams;
use crate::domain::target::Target;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub data_dir: Option<PathBuf>,
    pub synthetic_fallback: bool,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub symbols: Vec<String>,
    pub request: BacktestRequest,
    pub params: BacktestParams,
    pub data: DataSettings,
}

fn usize_of(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> usize {
    usize::try_from(config.get_int(section, key, default as i64)).unwrap_or(default)
}

pub fn build_risk_policy(config: &dyn ConfigPort) -> Result<RiskPolicy, GatetraderError> {
    validate_risk_config(config)?;
    let defaults = RiskPolicy::default();
    let protected_reserves = match config.get_string("risk", "protected_reserves") {
        Some(raw) => parse_reserves(&raw)?,
        None => defaults.protected_reserves.clone(),
    };
    Ok(RiskPolicy {
        max_risk_fraction_per_trade: config.get_double(
            "risk",
            "max_risk_fraction",
            defaults.max_risk_fraction_per_trade,
        ),
        protected_reserves,
        max_concurrent_positions: usize_of(
            config,
            "risk",
            "max_concurrent_positions",
            defaults.max_concurrent_positions,
        ),
        lot_step: config.get_double("risk", "lot_step", defaults.lot_step),
        stop_loss_pct: config.get_double("risk", "stop_loss_pct", defaults.stop_loss_pct),
    })
}

pub fn build_strategy_params(
    config: &dyn ConfigPort,
) -> Result<(IndicatorParams, SignalParams), GatetraderError> {
    validate_strategy_config(config)?;
    let ind = IndicatorParams::default();
    let sig = SignalParams::default();
    let mult = config.get_double("strategy", "bollinger_mult", ind.bollinger_mult_x100 as f64 / 100.0);
    Ok((
        IndicatorParams {
            rsi_period: usize_of(config, "strategy", "rsi_period", ind.rsi_period),
            bollinger_period: usize_of(config, "strategy", "bollinger_period", ind.bollinger_period),
            bollinger_mult_x100: (mult * 100.0).round() as u32,
            ma_short_period: usize_of(config, "strategy", "ma_short_period", ind.ma_short_period),
            ma_long_period: usize_of(config, "strategy", "ma_long_period", ind.ma_long_period),
        },
        SignalParams {
            rsi_oversold: config.get_double("strategy", "rsi_oversold", sig.rsi_oversold),
            rsi_overbought: config.get_double("strategy", "rsi_overbought", sig.rsi_overbought),
        },
    ))
}

/// Start of the current hour, so runs without `as_of` line up with bar opens.
fn current_hour() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(TimeDelta::hours(1)).unwrap_or(now)
}

fn parse_as_of(config: &dyn ConfigPort) -> Result<DateTime<Utc>, GatetraderError> {
    match config.get_string("backtest", "as_of") {
        Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| GatetraderError::ConfigInvalid {
                section: "backtest".to_string(),
                key: "as_of".to_string(),
                reason: format!("expected RFC 3339 timestamp: {}", e),
            }),
        None => Ok(current_hour()),
    }
}

pub fn build_backtest_settings(config: &dyn ConfigPort) -> Result<BacktestSettings, GatetraderError> {
    validate_backtest_config(config)?;
    let risk = build_risk_policy(config)?;
    let (indicators, signals) = build_strategy_params(config)?;

    let raw_symbols = config
        .get_string("backtest", "symbols")
        .filter(|s| !s.trim().is_empty())
        .map(Ok)
        .unwrap_or_else(|| config.require_string("backtest", "symbol"))?;
    let symbols = parse_symbols(&raw_symbols).map_err(|e| GatetraderError::ConfigInvalid {
        section: "backtest".to_string(),
        key: "symbols".to_string(),
        reason: e.to_string(),
    })?;

    let timeframe = match config.get_string("backtest", "timeframe") {
        Some(raw) => raw.parse::<Timeframe>().map_err(|reason| GatetraderError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "timeframe".to_string(),
            reason,
        })?,
        None => Timeframe::OneHour,
    };

    let initial_capital = config.get_double("backtest", "initial_capital", 0.0);
    let request = BacktestRequest {
        symbol: symbols[0].clone(),
        timeframe,
        days_back: u32::try_from(config.get_int("backtest", "days_back", 30)).unwrap_or(30),
        initial_capital,
        risk_per_trade: risk.max_risk_fraction_per_trade,
        monthly_target: config.get_double("target", "monthly", 0.0),
        protected_reserve: config.get_double("backtest", "protected_reserve", 0.0),
        as_of: parse_as_of(config)?,
    };

    let params = BacktestParams {
        initial_capital,
        indicators,
        signals,
        risk,
        execution: ExecutionConfig {
            commission_pct: config.get_double("backtest", "commission_pct", 0.0),
            slippage_pct: config.get_double("backtest", "slippage_pct", 0.0),
            allow_shorting: config.get_bool("backtest", "allow_shorting", false),
        },
    };

    let data = DataSettings {
        data_dir: config.get_string("backtest", "data_dir").map(PathBuf::from),
        synthetic_fallback: config.get_bool("backtest", "synthetic_fallback", false),
        seed: u64::try_from(config.get_int("backtest", "seed", 42)).unwrap_or(42),
    };

    Ok(BacktestSettings {
        symbols,
        request,
        params,
        data,
    })
}

pub fn build_target(config: &dyn ConfigPort) -> Result<Target, GatetraderError> {
    validate_target_config(config)?;
    let monthly = config.get_double("target", "monthly", 0.0);
    let derived = Target::from_monthly(monthly, Utc::now())?;
    Target::new(
        monthly,
        config.get_double("target", "weekly", derived.weekly()),
        config.get_double("target", "daily", derived.daily()),
        derived.updated_at(),
    )
}

pub fn build_decision_policy(config: &dyn ConfigPort) -> Result<DecisionPolicy, GatetraderError> {
    validate_decision_config(config)?;
    let d = DecisionPolicy::default();
    Ok(DecisionPolicy {
        progress_margin: config.get_double("decision", "progress_margin", d.progress_margin),
        confidence_threshold: config.get_double("decision", "confidence_threshold", d.confidence_threshold),
        log_capacity: usize_of(config, "decision", "log_capacity", d.log_capacity),
        timeout_ms: u64::try_from(config.get_int("decision", "timeout_ms", d.timeout_ms as i64))
            .unwrap_or(d.timeout_ms),
    })
}
