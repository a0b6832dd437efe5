#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use gatetrader::domain::decision::{DecisionRecord, PortfolioSnapshot};
use gatetrader::domain::error::GatetraderError;
pub use gatetrader::domain::ohlcv::{PriceBar, Timeframe};
use gatetrader::domain::risk::{AssetBalance, Holdings};
use gatetrader::domain::signal::Direction;
use gatetrader::domain::target::Target;
use gatetrader::ports::account_port::AccountPort;
use gatetrader::ports::audit_port::AuditPort;
use gatetrader::ports::data_port::DataPort;
use gatetrader::ports::target_port::TargetPort;
use gatetrader::ports::trading_bot_port::TradingBotPort;
use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

/// Hourly bars with high/low 0.1% around each close.
pub fn hourly_bars(symbol: &str, from: DateTime<Utc>, closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            symbol: symbol.to_string(),
            timeframe: Timeframe::OneHour,
            open_time: from + Duration::hours(i as i64),
            open: close,
            high: close * 1.001,
            low: close * 0.999,
            close,
            volume: 1.0,
        })
        .collect()
}

/// 721 hourly closes starting at R1.9M: quiet zigzag stretches broken by
/// three sharp 2.5% drops and, later, three 2.5% rallies.
pub fn btc_zar_closes() -> Vec<f64> {
    let mut closes = vec![1_900_000.0];
    let mut price = 1_900_000.0;
    while closes.len() < 721 {
        for k in 0..40 {
            price *= if k % 2 == 0 { 1.0025 } else { 0.998 };
            closes.push(price);
        }
        for _ in 0..3 {
            price *= 0.975;
            closes.push(price);
        }
        for k in 0..30 {
            price *= if k % 2 == 0 { 1.0025 } else { 0.998 };
            closes.push(price);
        }
        for _ in 0..3 {
            price *= 1.025;
            closes.push(price);
        }
    }
    closes.truncate(721);
    closes
}

pub fn btc_zar_bars() -> Vec<PriceBar> {
    hourly_bars("BTC/ZAR", start(), &btc_zar_closes())
}

pub fn flat_bars(symbol: &str, n: usize, price: f64) -> Vec<PriceBar> {
    (0..n)
        .map(|i| PriceBar {
            symbol: symbol.to_string(),
            timeframe: Timeframe::OneHour,
            open_time: start() + Duration::hours(i as i64),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        })
        .collect()
}

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn get_ohlcv(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PriceBar>, GatetraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(GatetraderError::CollaboratorUnavailable {
                collaborator: "market data".to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.open_time >= since)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, GatetraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn holdings(entries: &[(&str, f64, f64)]) -> Holdings {
    entries
        .iter()
        .map(|&(asset, quantity, price)| (asset.to_string(), AssetBalance { quantity, price }))
        .collect()
}

pub fn snapshot(total_value: f64, period_start_value: f64, holdings: Holdings) -> PortfolioSnapshot {
    PortfolioSnapshot {
        taken_at: start(),
        total_value,
        period_start_value,
        holdings,
    }
}

/// Account that answers after `delay`, or fails when `snapshot` is `None`.
pub struct MockAccount {
    pub snapshot: Option<PortfolioSnapshot>,
    pub delay: std::time::Duration,
}

impl MockAccount {
    pub fn new(snapshot: PortfolioSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            delay: std::time::Duration::ZERO,
        }
    }

    pub fn slow(snapshot: PortfolioSnapshot, delay: std::time::Duration) -> Self {
        Self {
            snapshot: Some(snapshot),
            delay,
        }
    }

    pub fn down() -> Self {
        Self {
            snapshot: None,
            delay: std::time::Duration::ZERO,
        }
    }
}

impl AccountPort for MockAccount {
    fn get_portfolio_snapshot(&self) -> Result<PortfolioSnapshot, GatetraderError> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.snapshot
            .clone()
            .ok_or_else(|| GatetraderError::CollaboratorUnavailable {
                collaborator: "account".to_string(),
                reason: "exchange offline".to_string(),
            })
    }
}

pub struct MockTargets {
    pub target: Mutex<Target>,
}

impl MockTargets {
    pub fn monthly(monthly: f64) -> Self {
        Self {
            target: Mutex::new(Target::from_monthly(monthly, start()).unwrap()),
        }
    }
}

impl TargetPort for MockTargets {
    fn get_target(&self) -> Result<Target, GatetraderError> {
        Ok(self.target.lock().unwrap().clone())
    }

    fn update_target(&self, target: &Target) -> Result<(), GatetraderError> {
        *self.target.lock().unwrap() = target.clone();
        Ok(())
    }
}

/// Bot that records orders. A `delay` makes it slow; with
/// `honors_deadline` it gives up without placing the order once the delay
/// would overrun the deadline.
#[derive(Default)]
pub struct RecordingBot {
    pub orders: Mutex<Vec<(String, Direction, f64)>>,
    pub reject: bool,
    pub delay: std::time::Duration,
    pub honors_deadline: bool,
}

impl RecordingBot {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: std::time::Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn slow_with_deadline(delay: std::time::Duration) -> Self {
        Self {
            delay,
            honors_deadline: true,
            ..Self::default()
        }
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }
}

impl TradingBotPort for RecordingBot {
    fn submit_trade(
        &self,
        symbol: &str,
        direction: Direction,
        size: f64,
        deadline: std::time::Duration,
    ) -> Result<String, GatetraderError> {
        if self.reject {
            return Err(GatetraderError::CollaboratorUnavailable {
                collaborator: "trading bot".to_string(),
                reason: "bot paused".to_string(),
            });
        }
        if self.honors_deadline && self.delay > deadline {
            thread::sleep(deadline);
            return Err(GatetraderError::CollaboratorTimeout {
                collaborator: "trading bot".to_string(),
                timeout_ms: deadline.as_millis() as u64,
            });
        }
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let mut orders = self.orders.lock().unwrap();
        orders.push((symbol.to_string(), direction, size));
        Ok(format!("order-{}", orders.len()))
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    pub records: Mutex<Vec<DecisionRecord>>,
}

impl RecordingAudit {
    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl AuditPort for RecordingAudit {
    fn record(&self, record: &DecisionRecord) -> Result<(), GatetraderError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
