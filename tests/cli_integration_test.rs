//! CLI integration tests: argument parsing, config resolution and the
//! command runners against real files on disk.

mod common;

use clap::Parser;
use common::*;
use gatetrader::adapters::csv_adapter::{write_bars, CsvAdapter};
use gatetrader::adapters::csv_report_adapter::CsvReportAdapter;
use gatetrader::adapters::file_config_adapter::FileConfigAdapter;
use gatetrader::adapters::market_data::MarketDataSource;
use gatetrader::cli::{self, Cli, Command};
use gatetrader::domain::decision::FinalDecision;
use gatetrader::domain::error::GatetraderError;
use gatetrader::domain::signal::{Direction, Signal};
use gatetrader::ports::target_port::TargetPort;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use tempfile::TempDir;

fn is_success(code: ExitCode) -> bool {
    format!("{:?}", code) == format!("{:?}", ExitCode::SUCCESS)
}

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const SYNTHETIC_INI: &str = r#"
[backtest]
symbols = BTC/ZAR, ETH/ZAR
timeframe = 1h
days_back = 30
initial_capital = 154273.71
as_of = 2024-07-01T00:00:00Z
seed = 7

[risk]
max_risk_fraction = 0.04
stop_loss_pct = 0.08

[target]
monthly = 8000
"#;

mod parsing {
    use super::*;

    #[test]
    fn backtest_flags() {
        let cli = Cli::try_parse_from([
            "gatetrader", "-v", "backtest", "-c", "run.ini", "--symbol", "eth/zar", "--days", "7",
            "--synthetic",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Backtest {
                symbol,
                days,
                synthetic,
                output,
                ..
            } => {
                assert_eq!(symbol.as_deref(), Some("eth/zar"));
                assert_eq!(days, Some(7));
                assert!(synthetic);
                assert!(output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn days_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["gatetrader", "backtest", "-c", "run.ini", "--days", "0"]).is_err());
    }

    #[test]
    fn decide_parses_direction() {
        let cli = Cli::try_parse_from([
            "gatetrader", "decide", "-c", "live.ini", "--symbol", "BTC/ZAR", "--direction", "sell",
            "--confidence", "0.8",
        ])
        .unwrap();
        match cli.command {
            Command::Decide {
                direction,
                confidence,
                reasoning,
                model_direction,
                ..
            } => {
                assert_eq!(direction, Direction::Sell);
                assert_eq!(confidence, 0.8);
                assert_eq!(reasoning, "manual");
                assert!(model_direction.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from([
            "gatetrader", "decide", "-c", "x.ini", "--symbol", "BTC/ZAR", "--direction", "short"
        ])
        .is_err());
    }

    #[test]
    fn decide_parses_model_prediction() {
        let cli = Cli::try_parse_from([
            "gatetrader", "decide", "-c", "live.ini", "--symbol", "BTC/ZAR", "--direction", "buy",
            "--model-direction", "BUY", "--model-confidence", "0.7",
        ])
        .unwrap();
        match cli.command {
            Command::Decide {
                model_direction,
                model_confidence,
                ..
            } => {
                assert_eq!(model_direction, Some(Direction::Buy));
                assert_eq!(model_confidence, 0.7);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}

mod settings {
    use super::*;

    #[test]
    fn overrides_replace_symbol_and_days() {
        let adapter = FileConfigAdapter::from_string(SYNTHETIC_INI).unwrap();
        let settings = cli::resolve_backtest_settings(&adapter, Some("xrp/zar"), Some(14)).unwrap();
        assert_eq!(settings.symbols, vec!["XRP/ZAR"]);
        assert_eq!(settings.request.symbol, "XRP/ZAR");
        assert_eq!(settings.request.days_back, 14);
        assert_eq!(settings.request.initial_capital, 154_273.71);
    }

    #[test]
    fn symbol_override_must_be_single() {
        let adapter = FileConfigAdapter::from_string(SYNTHETIC_INI).unwrap();
        let err = cli::resolve_backtest_settings(&adapter, Some("BTC/ZAR,ETH/ZAR"), None).unwrap_err();
        assert!(matches!(err, GatetraderError::ConfigInvalid { key, .. } if key == "symbol"));
    }

    #[test]
    fn data_source_follows_settings() {
        let adapter = FileConfigAdapter::from_string(SYNTHETIC_INI).unwrap();
        let mut settings = cli::resolve_backtest_settings(&adapter, None, None).unwrap();
        let symbols = settings.symbols.clone();

        assert!(matches!(
            cli::build_data_source(&settings.data, &symbols, false),
            MarketDataSource::Synthetic(_)
        ));

        settings.data.data_dir = Some("/data".into());
        assert!(matches!(
            cli::build_data_source(&settings.data, &symbols, false),
            MarketDataSource::Live(_)
        ));
        assert!(matches!(
            cli::build_data_source(&settings.data, &symbols, true),
            MarketDataSource::Synthetic(_)
        ));

        settings.data.synthetic_fallback = true;
        assert!(matches!(
            cli::build_data_source(&settings.data, &symbols, false),
            MarketDataSource::LiveWithFallback { .. }
        ));
    }
}

mod commands {
    use super::*;

    #[test]
    fn synthetic_backtest_writes_report() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(SYNTHETIC_INI);
        let output = dir.path().join("btc.csv");

        let code = cli::run_backtest_command(ini.path(), None, None, Some(&output), true);
        assert!(is_success(code));
        assert!(output.exists());
        assert!(CsvReportAdapter::equity_path(&output).exists());
        assert!(CsvReportAdapter::summary_path(&output).exists());
    }

    #[test]
    fn csv_backtest_trades_the_scenario() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        fs::create_dir_all(&data_dir).unwrap();
        let csv = CsvAdapter::new(data_dir.clone());
        write_bars(&csv.csv_path("BTC/ZAR", Timeframe::OneHour), &btc_zar_bars()).unwrap();

        let ini = write_temp_ini(&format!(
            r#"
[backtest]
symbol = BTC/ZAR
days_back = 30
initial_capital = 154273.71
as_of = 2024-07-01T00:00:00Z
data_dir = {}

[risk]
max_risk_fraction = 0.04
stop_loss_pct = 0.08

[target]
monthly = 8000
"#,
            data_dir.display()
        ));
        let output = dir.path().join("report").join("btc.csv");

        let code = cli::run_backtest_command(ini.path(), None, None, Some(&output), false);
        assert!(is_success(code));
        let ledger = fs::read_to_string(&output).unwrap();
        assert!(ledger.lines().count() > 1);
    }

    #[test]
    fn missing_csv_without_fallback_fails() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&format!(
            "[backtest]\nsymbol = BTC/ZAR\ninitial_capital = 1000\ndata_dir = {}\n",
            dir.path().display()
        ));
        let code = cli::run_backtest_command(ini.path(), None, None, None, false);
        assert!(!is_success(code));
    }

    #[test]
    fn compare_writes_one_report_per_symbol() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(SYNTHETIC_INI);
        let out = dir.path().join("compare");

        let code = cli::run_compare_command(ini.path(), None, Some(&out), true);
        assert!(is_success(code));
        assert!(out.join("BTC_ZAR.csv").exists());
        assert!(out.join("ETH_ZAR.csv").exists());
    }

    #[test]
    fn missing_config_file_fails() {
        let code = cli::run_backtest_command(Path::new("/nonexistent/gatetrader.ini"), None, None, None, true);
        assert!(!is_success(code));
    }
}

mod live {
    use super::*;

    const ACCOUNT: &str = r#"{
        "taken_at": "2024-07-01T12:00:00Z",
        "total_value": 195000.0,
        "period_start_value": 195000.0,
        "holdings": {
            "BTC": {"quantity": 0.05, "price": 1900000.0},
            "ZAR": {"quantity": 100000.0, "price": 1.0}
        }
    }"#;

    fn live_ini(dir: &TempDir) -> tempfile::NamedTempFile {
        let account = dir.path().join("account.json");
        fs::write(&account, ACCOUNT).unwrap();
        write_temp_ini(&format!(
            r#"
[target]
monthly = 8000

[decision]
timeout_ms = 2000

[live]
account_file = {}
target_file = {}
audit_file = {}
"#,
            account.display(),
            dir.path().join("target.json").display(),
            dir.path().join("audit.jsonl").display()
        ))
    }

    #[test]
    fn gate_seeds_target_and_audits_decisions() {
        let dir = TempDir::new().unwrap();
        let ini = live_ini(&dir);
        let adapter = FileConfigAdapter::from_file(ini.path()).unwrap();

        let gate = cli::build_gate(&adapter).unwrap();
        let seeded = gatetrader::adapters::json_target_adapter::JsonTargetAdapter::new(
            dir.path().join("target.json"),
        );
        assert_eq!(seeded.get_target().unwrap().monthly(), 8_000.0);

        let signal = Signal::new(chrono::Utc::now(), "BTC/ZAR", Direction::Buy, 0.9, "oversold");
        let record = gate.approve(&signal);
        assert_eq!(record.final_decision, FinalDecision::Approved);

        let audit = fs::read_to_string(dir.path().join("audit.jsonl")).unwrap();
        assert_eq!(audit.lines().count(), 1);
        assert!(audit.contains("\"APPROVED\""));
    }

    #[test]
    fn decide_command_appends_audit_line() {
        let dir = TempDir::new().unwrap();
        let ini = live_ini(&dir);

        let code = cli::run_decide_command(ini.path(), "btc/zar", Direction::Hold, 0.0, "quiet", None);
        assert!(is_success(code));
        let audit = fs::read_to_string(dir.path().join("audit.jsonl")).unwrap();
        assert!(audit.contains("no actionable signal"));
    }

    #[test]
    fn decide_with_disagreeing_model_holds() {
        let dir = TempDir::new().unwrap();
        let ini = live_ini(&dir);

        let code = cli::run_decide_command(
            ini.path(),
            "BTC/ZAR",
            Direction::Buy,
            0.9,
            "oversold",
            Some((Direction::Sell, 0.8)),
        );
        assert!(is_success(code));
        let audit = fs::read_to_string(dir.path().join("audit.jsonl")).unwrap();
        assert!(audit.contains("\"REJECTED\""));
        assert!(audit.contains("sources disagree"));
    }

    #[test]
    fn gate_requires_account_file() {
        let adapter = FileConfigAdapter::from_string("[target]\nmonthly = 8000\n").unwrap();
        let err = cli::build_gate(&adapter).err().unwrap();
        assert!(matches!(err, GatetraderError::ConfigMissing { key, .. } if key == "account_file"));
    }
}
