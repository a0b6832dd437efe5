//! Configuration validation.
//!
//! Every section is checked before a run starts so that a bad value fails
//! with the offending section and key instead of partway through a backtest.

use std::collections::BTreeMap;

use crate::domain::error::GatetraderError;
use crate::domain::ohlcv::Timeframe;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> GatetraderError {
    GatetraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), GatetraderError> {
    validate_initial_capital(config)?;
    validate_costs(config)?;
    validate_symbols(config)?;
    validate_timeframe(config)?;
    validate_days_back(config)?;
    validate_backtest_reserve(config)?;
    Ok(())
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), GatetraderError> {
    let fraction = config.get_double("risk", "max_risk_fraction", 0.04);
    if fraction <= 0.0 || fraction > 1.0 {
        return Err(invalid("risk", "max_risk_fraction", "max_risk_fraction must be in (0, 1]"));
    }
    let stop = config.get_double("risk", "stop_loss_pct", 0.02);
    if stop <= 0.0 || stop >= 1.0 {
        return Err(invalid("risk", "stop_loss_pct", "stop_loss_pct must be in (0, 1)"));
    }
    if config.get_int("risk", "max_concurrent_positions", 1) < 1 {
        return Err(invalid(
            "risk",
            "max_concurrent_positions",
            "max_concurrent_positions must be at least 1",
        ));
    }
    if config.get_double("risk", "lot_step", 1e-8) <= 0.0 {
        return Err(invalid("risk", "lot_step", "lot_step must be positive"));
    }
    if let Some(raw) = config.get_string("risk", "protected_reserves") {
        parse_reserves(&raw)?;
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), GatetraderError> {
    for key in [
        "rsi_period",
        "bollinger_period",
        "ma_short_period",
        "ma_long_period",
    ] {
        if config.get_int("strategy", key, 1) < 1 {
            return Err(invalid("strategy", key, format!("{} must be at least 1", key)));
        }
    }
    if config.get_double("strategy", "bollinger_mult", 2.0) <= 0.0 {
        return Err(invalid("strategy", "bollinger_mult", "bollinger_mult must be positive"));
    }

    let oversold = config.get_double("strategy", "rsi_oversold", 30.0);
    let overbought = config.get_double("strategy", "rsi_overbought", 70.0);
    if !(0.0 < oversold && oversold < overbought && overbought < 100.0) {
        return Err(invalid(
            "strategy",
            "rsi_oversold",
            "thresholds must satisfy 0 < rsi_oversold < rsi_overbought < 100",
        ));
    }
    Ok(())
}

pub fn validate_target_config(config: &dyn ConfigPort) -> Result<(), GatetraderError> {
    if config.get_double("target", "monthly", 0.0) <= 0.0 {
        return Err(invalid("target", "monthly", "monthly target must be positive"));
    }
    for key in ["weekly", "daily"] {
        if config.get_string("target", key).is_some() && config.get_double("target", key, 0.0) <= 0.0 {
            return Err(invalid("target", key, format!("{} target must be positive", key)));
        }
    }
    Ok(())
}

pub fn validate_decision_config(config: &dyn ConfigPort) -> Result<(), GatetraderError> {
    let margin = config.get_double("decision", "progress_margin", 0.1);
    if !(0.0..1.0).contains(&margin) {
        return Err(invalid("decision", "progress_margin", "progress_margin must be in [0, 1)"));
    }
    let threshold = config.get_double("decision", "confidence_threshold", 0.6);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(invalid(
            "decision",
            "confidence_threshold",
            "confidence_threshold must be in [0, 1]",
        ));
    }
    if config.get_int("decision", "log_capacity", 100) < 1 {
        return Err(invalid("decision", "log_capacity", "log_capacity must be at least 1"));
    }
    if config.get_int("decision", "timeout_ms", 5_000) < 1 {
        return Err(invalid("decision", "timeout_ms", "timeout_ms must be at least 1"));
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), GatetraderError> {
    let value = config.get_double("backtest", "initial_capital", 0.0);
    if value <= 0.0 {
        return Err(invalid("backtest", "initial_capital", "initial_capital must be positive"));
    }
    Ok(())
}

fn validate_costs(config: &dyn ConfigPort) -> Result<(), GatetraderError> {
    for key in ["commission_pct", "slippage_pct"] {
        if config.get_double("backtest", key, 0.0) < 0.0 {
            return Err(invalid("backtest", key, format!("{} must be non-negative", key)));
        }
    }
    Ok(())
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), GatetraderError> {
    let raw = match (
        config.get_string("backtest", "symbols"),
        config.get_string("backtest", "symbol"),
    ) {
        (Some(s), _) if !s.trim().is_empty() => ("symbols", s),
        (_, Some(s)) if !s.trim().is_empty() => ("symbol", s),
        _ => {
            return Err(GatetraderError::ConfigMissing {
                section: "backtest".to_string(),
                key: "symbol".to_string(),
            })
        }
    };
    parse_symbols(&raw.1).map_err(|e| invalid("backtest", raw.0, e.to_string()))?;
    Ok(())
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<(), GatetraderError> {
    if let Some(value) = config.get_string("backtest", "timeframe") {
        value
            .trim()
            .parse::<Timeframe>()
            .map_err(|e| invalid("backtest", "timeframe", e))?;
    }
    Ok(())
}

fn validate_days_back(config: &dyn ConfigPort) -> Result<(), GatetraderError> {
    let days = config.get_int("backtest", "days_back", 30);
    if !(1..=3650).contains(&days) {
        return Err(invalid("backtest", "days_back", "days_back must be between 1 and 3650"));
    }
    Ok(())
}

fn validate_backtest_reserve(config: &dyn ConfigPort) -> Result<(), GatetraderError> {
    if config.get_double("backtest", "protected_reserve", 0.0) < 0.0 {
        return Err(invalid(
            "backtest",
            "protected_reserve",
            "protected_reserve must be non-negative",
        ));
    }
    Ok(())
}

/// Parses `XRP:1000, BTC:0.5` into asset -> quantity.
pub fn parse_reserves(input: &str) -> Result<BTreeMap<String, f64>, GatetraderError> {
    let mut reserves = BTreeMap::new();
    for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (asset, quantity) = token.split_once(':').ok_or_else(|| {
            invalid("risk", "protected_reserves", format!("expected ASSET:QTY, got {}", token))
        })?;
        let asset = asset.trim().to_uppercase();
        let quantity: f64 = quantity.trim().parse().map_err(|_| {
            invalid("risk", "protected_reserves", format!("invalid quantity in {}", token))
        })?;
        if asset.is_empty() || !(quantity >= 0.0) {
            return Err(invalid(
                "risk",
                "protected_reserves",
                format!("reserve {} must name an asset and a non-negative quantity", token),
            ));
        }
        reserves.insert(asset, quantity);
    }
    Ok(reserves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn key_of(err: GatetraderError) -> String {
        match err {
            GatetraderError::ConfigInvalid { key, .. } | GatetraderError::ConfigMissing { key, .. } => key,
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            r#"
[backtest]
symbol = BTC/ZAR
timeframe = 1h
days_back = 30
initial_capital = 154273.71
commission_pct = 0.1
slippage_pct = 0.05
"#,
        );
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let config = make_config("[backtest]\nsymbol = BTC/ZAR\ninitial_capital = 0\n");
        assert_eq!(key_of(validate_backtest_config(&config).unwrap_err()), "initial_capital");
    }

    #[test]
    fn negative_costs_fail() {
        let config = make_config("[backtest]\nsymbol = BTC/ZAR\ninitial_capital = 100\ncommission_pct = -0.1\n");
        assert_eq!(key_of(validate_backtest_config(&config).unwrap_err()), "commission_pct");

        let config = make_config("[backtest]\nsymbol = BTC/ZAR\ninitial_capital = 100\nslippage_pct = -1\n");
        assert_eq!(key_of(validate_backtest_config(&config).unwrap_err()), "slippage_pct");
    }

    #[test]
    fn missing_symbol_fails() {
        let config = make_config("[backtest]\ninitial_capital = 100\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, GatetraderError::ConfigMissing { ref key, .. } if key == "symbol"));
    }

    #[test]
    fn symbols_list_is_parsed() {
        let config = make_config("[backtest]\ninitial_capital = 100\nsymbols = BTC/ZAR,ETH/ZAR\n");
        assert!(validate_backtest_config(&config).is_ok());

        let config = make_config("[backtest]\ninitial_capital = 100\nsymbols = BTC/ZAR,BTC/ZAR\n");
        assert_eq!(key_of(validate_backtest_config(&config).unwrap_err()), "symbols");
    }

    #[test]
    fn unknown_timeframe_fails() {
        let config = make_config("[backtest]\nsymbol = BTC/ZAR\ninitial_capital = 100\ntimeframe = 3h\n");
        assert_eq!(key_of(validate_backtest_config(&config).unwrap_err()), "timeframe");
    }

    #[test]
    fn days_back_out_of_range_fails() {
        let config = make_config("[backtest]\nsymbol = BTC/ZAR\ninitial_capital = 100\ndays_back = 0\n");
        assert_eq!(key_of(validate_backtest_config(&config).unwrap_err()), "days_back");
    }

    #[test]
    fn risk_defaults_pass() {
        assert!(validate_risk_config(&make_config("[risk]\n")).is_ok());
    }

    #[test]
    fn risk_fraction_out_of_range_fails() {
        let config = make_config("[risk]\nmax_risk_fraction = 1.5\n");
        assert_eq!(key_of(validate_risk_config(&config).unwrap_err()), "max_risk_fraction");
    }

    #[test]
    fn stop_loss_out_of_range_fails() {
        let config = make_config("[risk]\nstop_loss_pct = 0\n");
        assert_eq!(key_of(validate_risk_config(&config).unwrap_err()), "stop_loss_pct");
    }

    #[test]
    fn zero_positions_fails() {
        let config = make_config("[risk]\nmax_concurrent_positions = 0\n");
        assert_eq!(key_of(validate_risk_config(&config).unwrap_err()), "max_concurrent_positions");
    }

    #[test]
    fn reserves_parse() {
        let reserves = parse_reserves("xrp:1000, BTC : 0.5").unwrap();
        assert_eq!(reserves.get("XRP"), Some(&1000.0));
        assert_eq!(reserves.get("BTC"), Some(&0.5));
        assert!(parse_reserves("").unwrap().is_empty());
    }

    #[test]
    fn malformed_reserves_fail() {
        assert!(parse_reserves("XRP").is_err());
        assert!(parse_reserves("XRP:lots").is_err());
        assert!(parse_reserves("XRP:-5").is_err());
        let config = make_config("[risk]\nprotected_reserves = XRP=1000\n");
        assert_eq!(key_of(validate_risk_config(&config).unwrap_err()), "protected_reserves");
    }

    #[test]
    fn rsi_thresholds_must_be_ordered() {
        let config = make_config("[strategy]\nrsi_oversold = 70\nrsi_overbought = 30\n");
        assert_eq!(key_of(validate_strategy_config(&config).unwrap_err()), "rsi_oversold");
        assert!(validate_strategy_config(&make_config("[strategy]\n")).is_ok());
    }

    #[test]
    fn zero_period_fails() {
        let config = make_config("[strategy]\nbollinger_period = 0\n");
        assert_eq!(key_of(validate_strategy_config(&config).unwrap_err()), "bollinger_period");
    }

    #[test]
    fn target_requires_positive_monthly() {
        assert_eq!(key_of(validate_target_config(&make_config("[target]\n")).unwrap_err()), "monthly");
        assert!(validate_target_config(&make_config("[target]\nmonthly = 8000\n")).is_ok());
        let config = make_config("[target]\nmonthly = 8000\nweekly = -1\n");
        assert_eq!(key_of(validate_target_config(&config).unwrap_err()), "weekly");
    }

    #[test]
    fn decision_ranges() {
        assert!(validate_decision_config(&make_config("[decision]\n")).is_ok());
        let config = make_config("[decision]\nconfidence_threshold = 1.5\n");
        assert_eq!(key_of(validate_decision_config(&config).unwrap_err()), "confidence_threshold");
        let config = make_config("[decision]\nlog_capacity = 0\n");
        assert_eq!(key_of(validate_decision_config(&config).unwrap_err()), "log_capacity");
    }
}
