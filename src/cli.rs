//! CLI definition and dispatch.

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::dry_run_bot::DryRunBot;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_account_adapter::JsonAccountAdapter;
use crate::adapters::json_target_adapter::JsonTargetAdapter;
use crate::adapters::jsonl_audit_adapter::JsonlAuditAdapter;
use crate::adapters::market_data::MarketDataSource;
use crate::adapters::synthetic_adapter::SyntheticAdapter;
use crate::domain::comparator::{run_multi_pair, Comparison};
use crate::domain::decision::DecisionEngine;
use crate::domain::error::GatetraderError;
use crate::domain::gate::TradingGate;
use crate::domain::pipeline::{run_backtest, BacktestResult};
use crate::domain::settings::{
    build_backtest_settings, build_decision_policy, build_risk_policy, build_target,
    BacktestSettings, DataSettings,
};
use crate::domain::signal::{Direction, Signal};
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;
use crate::ports::target_port::TargetPort;

#[derive(Parser, Debug)]
#[command(name = "gatetrader", about = "Risk-gated crypto backtester and trade approval gate")]
pub struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest one symbol
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=3650))]
        days: Option<u32>,
        /// Trade ledger CSV; equity curve and summary are written next to it
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Ignore data_dir and use seeded synthetic bars
        #[arg(long)]
        synthetic: bool,
    },
    /// Backtest several symbols in parallel and rank them
    Compare {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated BASE/QUOTE list
        #[arg(long)]
        symbols: Option<String>,
        /// Directory for per-symbol reports
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        synthetic: bool,
    },
    /// Pass one signal through the live approval gate
    Decide {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        /// BUY, SELL or HOLD
        #[arg(long)]
        direction: Direction,
        #[arg(long, default_value_t = 0.5)]
        confidence: f64,
        #[arg(long, default_value = "manual")]
        reasoning: String,
        /// Model prediction to blend with the signal; disagreement is HOLD
        #[arg(long)]
        model_direction: Option<Direction>,
        #[arg(long, default_value_t = 0.5)]
        model_confidence: f64,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            symbol,
            days,
            output,
            synthetic,
        } => run_backtest_command(&config, symbol.as_deref(), days, output.as_deref(), synthetic),
        Command::Compare {
            config,
            symbols,
            output,
            synthetic,
        } => run_compare_command(&config, symbols.as_deref(), output.as_deref(), synthetic),
        Command::Decide {
            config,
            symbol,
            direction,
            confidence,
            reasoning,
            model_direction,
            model_confidence,
        } => run_decide_command(
            &config,
            &symbol,
            direction,
            confidence,
            &reasoning,
            model_direction.map(|d| (d, model_confidence)),
        ),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: &GatetraderError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

/// Picks the bar source for a run from the `[backtest]` data settings.
pub fn build_data_source(data: &DataSettings, symbols: &[String], force_synthetic: bool) -> MarketDataSource {
    let synthetic = SyntheticAdapter::new(data.seed).with_symbols(symbols.to_vec());
    match (&data.data_dir, force_synthetic) {
        (Some(dir), false) if data.synthetic_fallback => MarketDataSource::LiveWithFallback {
            live: Box::new(CsvAdapter::new(dir.clone())),
            synthetic,
        },
        (Some(dir), false) => MarketDataSource::Live(Box::new(CsvAdapter::new(dir.clone()))),
        _ => MarketDataSource::Synthetic(synthetic),
    }
}

fn single_symbol(raw: &str) -> Result<String, GatetraderError> {
    let symbols = parse_symbols(raw).map_err(|e| GatetraderError::ConfigInvalid {
        section: "cli".to_string(),
        key: "symbol".to_string(),
        reason: e.to_string(),
    })?;
    match symbols.as_slice() {
        [symbol] => Ok(symbol.clone()),
        _ => Err(GatetraderError::ConfigInvalid {
            section: "cli".to_string(),
            key: "symbol".to_string(),
            reason: "expected exactly one symbol".to_string(),
        }),
    }
}

/// Settings from `config` with command-line overrides applied.
pub fn resolve_backtest_settings(
    config: &dyn ConfigPort,
    symbol: Option<&str>,
    days: Option<u32>,
) -> Result<BacktestSettings, GatetraderError> {
    let mut settings = build_backtest_settings(config)?;
    if let Some(raw) = symbol {
        let symbol = single_symbol(raw)?;
        settings.request.symbol = symbol.clone();
        settings.symbols = vec![symbol];
    }
    if let Some(days) = days {
        settings.request.days_back = days;
    }
    Ok(settings)
}

pub fn print_summary(result: &BacktestResult) {
    let s = &result.statistics;
    println!("=== {} ({}) ===", result.symbol, result.timeframe);
    println!("Final Equity:     {:.2}", s.final_equity);
    println!("Total Profit:     {:.2} ({:.2}%)", s.total_profit, s.total_percentage);
    println!("Total Trades:     {}", s.total_trades);
    println!(
        "Won/Lost/Even:    {}/{}/{}",
        s.trades_won, s.trades_lost, s.trades_breakeven
    );
    println!("Win Rate:         {:.1}%", s.win_rate * 100.0);
    println!("Profit Factor:    {:.2}", s.profit_factor);
    println!("Max Drawdown:     {:.2}%", s.max_drawdown);
    println!("Risk Level:       {}", s.risk_level);
    println!(
        "Monthly Profit:   {:.2} of {:.2} target ({:.1}%)",
        s.monthly_profit,
        s.monthly_target,
        s.target_achievement
    );
}

pub fn print_comparison(comparison: &Comparison) {
    println!("{:<12} {:>8} {:>14} {:>10} {:>8}", "SYMBOL", "TRADES", "PROFIT", "DRAWDOWN", "RISK");
    for row in &comparison.rows {
        match &row.result {
            Ok(result) => {
                let s = &result.statistics;
                println!(
                    "{:<12} {:>8} {:>14.2} {:>9.2}% {:>8}",
                    row.symbol, s.total_trades, s.total_profit, s.max_drawdown, s.risk_level.to_string()
                );
            }
            Err(e) => println!("{:<12} failed: {}", row.symbol, e),
        }
    }
    match &comparison.best {
        Some(best) => println!("Best: {best}"),
        None => println!("Best: none"),
    }
}

pub fn run_backtest_command(
    config_path: &Path,
    symbol: Option<&str>,
    days: Option<u32>,
    output: Option<&Path>,
    force_synthetic: bool,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let settings = match resolve_backtest_settings(&adapter, symbol, days) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let source = build_data_source(&settings.data, &settings.symbols, force_synthetic);
    eprintln!(
        "Backtesting {} over {} days of {} bars",
        settings.request.symbol, settings.request.days_back, settings.request.timeframe
    );
    let result = match run_backtest(&source, &settings.request, &settings.params) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    print_summary(&result);

    if let Some(path) = output {
        if let Err(e) = CsvReportAdapter::new().write(&result, path) {
            return fail(&e);
        }
        eprintln!("Report written to: {}", path.display());
    }
    ExitCode::SUCCESS
}

pub fn run_compare_command(
    config_path: &Path,
    symbols: Option<&str>,
    output: Option<&Path>,
    force_synthetic: bool,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let mut settings = match build_backtest_settings(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    if let Some(raw) = symbols {
        settings.symbols = match parse_symbols(raw) {
            Ok(s) => s,
            Err(e) => {
                return fail(&GatetraderError::ConfigInvalid {
                    section: "cli".to_string(),
                    key: "symbols".to_string(),
                    reason: e.to_string(),
                })
            }
        };
    }

    let source = build_data_source(&settings.data, &settings.symbols, force_synthetic);
    eprintln!("Comparing {} symbols", settings.symbols.len());
    let comparison = run_multi_pair(&source, &settings.symbols, &settings.request, &settings.params);
    print_comparison(&comparison);

    if let Some(dir) = output {
        if let Err(e) = std::fs::create_dir_all(dir)
            .map_err(GatetraderError::from)
            .and_then(|()| CsvReportAdapter::new().write_comparison(&comparison, dir))
        {
            return fail(&e);
        }
        eprintln!("Reports written to: {}", dir.display());
    }

    match (&comparison.best, comparison.failures().next()) {
        (None, Some((_, err))) => err.into(),
        _ => ExitCode::SUCCESS,
    }
}

/// Wires the approval gate from the `[live]` section. A missing target file
/// is seeded from `[target]`.
pub fn build_gate(config: &dyn ConfigPort) -> Result<TradingGate, GatetraderError> {
    let risk = build_risk_policy(config)?;
    let policy = build_decision_policy(config)?;
    let account_file = config.require_string("live", "account_file")?;
    let target_file = config
        .get_string("live", "target_file")
        .unwrap_or_else(|| "target.json".to_string());
    let audit_file = config
        .get_string("live", "audit_file")
        .unwrap_or_else(|| "decisions.jsonl".to_string());

    let targets = JsonTargetAdapter::new(PathBuf::from(target_file));
    if !targets.path().exists() {
        targets.update_target(&build_target(config)?)?;
    }

    Ok(TradingGate::new(
        DecisionEngine::new(risk, policy),
        Arc::new(JsonAccountAdapter::new(PathBuf::from(account_file))),
        Arc::new(targets),
        Arc::new(DryRunBot::new()),
        Arc::new(JsonlAuditAdapter::new(PathBuf::from(audit_file))),
    ))
}

pub fn run_decide_command(
    config_path: &Path,
    symbol: &str,
    direction: Direction,
    confidence: f64,
    reasoning: &str,
    model: Option<(Direction, f64)>,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let symbol = match single_symbol(symbol) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let gate = match build_gate(&adapter) {
        Ok(g) => g,
        Err(e) => return fail(&e),
    };

    let now = Utc::now();
    let signal = Signal::new(now, symbol.as_str(), direction, confidence, reasoning);
    let record = match model {
        Some((model_direction, model_confidence)) => {
            let prediction = Signal::new(now, symbol.as_str(), model_direction, model_confidence, "model");
            gate.approve_with_model(&signal, &prediction)
        }
        None => gate.approve(&signal),
    };
    eprintln!("{}: {}", record.final_decision, record.reason);
    match serde_json::to_string_pretty(&record) {
        Ok(json) => println!("{json}"),
        Err(e) => return fail(&GatetraderError::from(e)),
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let settings = match build_backtest_settings(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    if let Err(e) = build_decision_policy(&adapter) {
        return fail(&e);
    }
    if adapter.get_string("target", "monthly").is_some() {
        if let Err(e) = build_target(&adapter) {
            return fail(&e);
        }
    }

    println!("symbols:   {}", settings.symbols.join(", "));
    println!("timeframe: {}", settings.request.timeframe);
    println!("days_back: {}", settings.request.days_back);
    println!(
        "risk:      {:.2}% per trade, stop {:.2}%",
        settings.params.risk.max_risk_fraction_per_trade * 100.0,
        settings.params.risk.stop_loss_pct * 100.0
    );
    for (asset, quantity) in &settings.params.risk.protected_reserves {
        println!("reserve:   {asset} {quantity}");
    }
    eprintln!("Configuration is valid");
    ExitCode::SUCCESS
}
