//! Live-trading decision gate: signal + account state + target -> verdict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

use super::error::GatetraderError;
use super::ohlcv::{base_asset, quote_asset};
use super::position::Side;
use super::risk::{
    floor_to_lot, sellable_quantity, size_position, tradable_quantity, Holdings, RiskPolicy,
};
use super::signal::{Direction, Signal};
use super::target::Target;

pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Account state at decision time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub taken_at: DateTime<Utc>,
    /// Current valuation of all holdings.
    pub total_value: f64,
    /// Valuation at the start of the current target period.
    pub period_start_value: f64,
    pub holdings: Holdings,
}

impl PortfolioSnapshot {
    pub fn target_progress(&self) -> f64 {
        self.total_value - self.period_start_value
    }

    pub fn price_of(&self, asset: &str) -> Option<f64> {
        self.holdings.get(asset).map(|b| b.price).filter(|p| *p > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPolicy {
    /// How far below the weekly target (as a fraction of it) progress must be
    /// before a confident BUY is approved outright.
    pub progress_margin: f64,
    pub confidence_threshold: f64,
    pub log_capacity: usize,
    pub timeout_ms: u64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        DecisionPolicy {
            progress_margin: 0.1,
            confidence_threshold: 0.6,
            log_capacity: DEFAULT_LOG_CAPACITY,
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FinalDecision {
    Approved,
    Rejected,
    Resized,
}

impl FinalDecision {
    pub fn is_actionable(&self) -> bool {
        !matches!(self, FinalDecision::Rejected)
    }
}

impl fmt::Display for FinalDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FinalDecision::Approved => "APPROVED",
            FinalDecision::Rejected => "REJECTED",
            FinalDecision::Resized => "RESIZED",
        };
        f.write_str(s)
    }
}

/// Target context the decision was taken against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategicInput {
    pub target_progress: f64,
    pub weekly_target: f64,
    pub monthly_target: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub timestamp: DateTime<Utc>,
    pub strategic_input: Option<StrategicInput>,
    pub signal: Signal,
    pub snapshot: Option<PortfolioSnapshot>,
    pub final_decision: FinalDecision,
    pub reason: String,
    pub confidence: f64,
    /// Order size for APPROVED and RESIZED decisions.
    pub size: Option<f64>,
}

impl DecisionRecord {
    /// A rejection taken without account or target context.
    pub fn rejected(signal: &Signal, reason: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        DecisionRecord {
            timestamp,
            strategic_input: None,
            signal: signal.clone(),
            snapshot: None,
            final_decision: FinalDecision::Rejected,
            reason: reason.into(),
            confidence: signal.confidence(),
            size: None,
        }
    }
}

/// Size of the trade a signal implies, or why there is none.
fn implied_size(
    signal: &Signal,
    snapshot: &PortfolioSnapshot,
    risk: &RiskPolicy,
) -> Result<f64, GatetraderError> {
    let symbol = signal.symbol();
    let asset = base_asset(symbol);
    let side = signal.direction().entry_side().unwrap_or(Side::Long);
    let entry = snapshot.price_of(asset).ok_or_else(|| GatetraderError::NoData {
        symbol: asset.to_string(),
    })?;
    let stop = risk.implied_stop(entry, side);
    let sized = size_position(snapshot.total_value, risk, entry, stop, symbol, &snapshot.holdings)?;

    match side {
        Side::Long => {
            // Paid from quote cash above its reserve, never from other holdings.
            let cash = quote_asset(symbol)
                .and_then(|quote| {
                    let price = snapshot.holdings.get(quote)?.price;
                    Some(tradable_quantity(risk, quote, &snapshot.holdings) * price)
                })
                .unwrap_or(0.0);
            let affordable = floor_to_lot(cash / entry, risk.lot_step);
            let size = sized.size.min(affordable);
            if !(size > 0.0) {
                return Err(GatetraderError::SizingCap {
                    symbol: symbol.to_string(),
                    requested: sized.size,
                    affordable,
                });
            }
            Ok(size)
        }
        Side::Short => {
            let sellable = sellable_quantity(risk, asset, &snapshot.holdings)?;
            let size = sized.size.min(sellable);
            if size <= 0.0 {
                return Err(GatetraderError::SizingCap {
                    symbol: symbol.to_string(),
                    requested: sized.size,
                    affordable: sellable,
                });
            }
            Ok(size)
        }
    }
}

/// Decides on one signal. Pure: the caller owns logging and submission.
///
/// Rules in order:
/// 1. progress short of the weekly target by more than the margin, and a BUY
///    above the confidence threshold: APPROVED;
/// 2. progress beyond the monthly target and a SELL: APPROVED;
/// 3. no valid size for the implied trade: REJECTED;
/// 4. otherwise the direction passes through, RESIZED to the risk size.
///
/// Rules 1 and 2 still need a valid size; a trade that would breach the risk
/// budget or a protected reserve is never approved.
pub fn evaluate_decision(
    signal: &Signal,
    snapshot: &PortfolioSnapshot,
    target: &Target,
    risk: &RiskPolicy,
    policy: &DecisionPolicy,
    now: DateTime<Utc>,
) -> DecisionRecord {
    let progress = snapshot.target_progress();
    let strategic_input = StrategicInput {
        target_progress: progress,
        weekly_target: target.weekly(),
        monthly_target: target.monthly(),
    };
    let record = |final_decision, reason: String, size| DecisionRecord {
        timestamp: now,
        strategic_input: Some(strategic_input.clone()),
        signal: signal.clone(),
        snapshot: Some(snapshot.clone()),
        final_decision,
        reason,
        confidence: signal.confidence(),
        size,
    };

    let direction = signal.direction();
    if direction == Direction::Hold {
        return record(FinalDecision::Rejected, "no actionable signal".to_string(), None);
    }

    let size = match implied_size(signal, snapshot, risk) {
        Ok(size) => size,
        Err(e) => return record(FinalDecision::Rejected, format!("sizing failed: {}", e), None),
    };

    let behind_weekly = progress < target.weekly() * (1.0 - policy.progress_margin);
    if behind_weekly && direction == Direction::Buy && signal.confidence() > policy.confidence_threshold {
        return record(
            FinalDecision::Approved,
            format!(
                "progress {:.2} behind weekly target {:.2}; confident BUY ({:.2})",
                progress,
                target.weekly(),
                signal.confidence()
            ),
            Some(size),
        );
    }

    if progress > target.monthly() && direction == Direction::Sell {
        return record(
            FinalDecision::Approved,
            format!(
                "progress {:.2} beyond monthly target {:.2}; taking profit",
                progress,
                target.monthly()
            ),
            Some(size),
        );
    }

    record(
        FinalDecision::Resized,
        format!("{} passed through at risk size {}", direction, size),
        Some(size),
    )
}

/// Append-only window of the most recent decisions.
#[derive(Debug, Clone)]
pub struct DecisionLog {
    capacity: usize,
    records: VecDeque<DecisionRecord>,
}

impl DecisionLog {
    pub fn with_capacity(capacity: usize) -> Self {
        DecisionLog {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, record: DecisionRecord) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Up to `limit` records, most recent first.
    pub fn recent(&self, limit: usize) -> Vec<DecisionRecord> {
        self.records.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Decision rules plus the log they write to.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    risk: RiskPolicy,
    policy: DecisionPolicy,
    log: DecisionLog,
}

impl DecisionEngine {
    pub fn new(risk: RiskPolicy, policy: DecisionPolicy) -> Self {
        DecisionEngine {
            log: DecisionLog::with_capacity(policy.log_capacity),
            risk,
            policy,
        }
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn risk(&self) -> &RiskPolicy {
        &self.risk
    }

    /// Decides without recording.
    pub fn decide(
        &self,
        signal: &Signal,
        snapshot: &PortfolioSnapshot,
        target: &Target,
        now: DateTime<Utc>,
    ) -> DecisionRecord {
        evaluate_decision(signal, snapshot, target, &self.risk, &self.policy, now)
    }

    /// Decides and appends exactly one record.
    pub fn evaluate(
        &mut self,
        signal: &Signal,
        snapshot: &PortfolioSnapshot,
        target: &Target,
        now: DateTime<Utc>,
    ) -> DecisionRecord {
        let record = self.decide(signal, snapshot, target, now);
        self.append(record.clone());
        record
    }

    pub fn append(&mut self, record: DecisionRecord) {
        debug!(
            symbol = %record.signal.symbol(),
            decision = %record.final_decision,
            reason = %record.reason,
            "decision recorded"
        );
        self.log.append(record);
    }

    pub fn get_decision_log(&self, limit: usize) -> Vec<DecisionRecord> {
        self.log.recent(limit)
    }

    pub fn log(&self) -> &DecisionLog {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::risk::AssetBalance;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    fn snapshot(progress: f64, btc: f64) -> PortfolioSnapshot {
        let mut holdings = Holdings::new();
        holdings.insert("BTC".into(), AssetBalance { quantity: btc, price: 1_000_000.0 });
        holdings.insert("ZAR".into(), AssetBalance { quantity: 100_000.0, price: 1.0 });
        let total_value = btc * 1_000_000.0 + 100_000.0;
        PortfolioSnapshot {
            taken_at: now(),
            total_value,
            period_start_value: total_value - progress,
            holdings,
        }
    }

    fn target() -> Target {
        Target::from_monthly(8_000.0, now()).unwrap()
    }

    fn signal(direction: Direction, confidence: f64) -> Signal {
        Signal::new(now(), "BTC/ZAR", direction, confidence, "test")
    }

    fn engine() -> DecisionEngine {
        DecisionEngine::new(RiskPolicy::default(), DecisionPolicy::default())
    }

    #[test]
    fn confident_buy_behind_weekly_target_is_approved() {
        let record = engine().decide(&signal(Direction::Buy, 0.8), &snapshot(0.0, 0.1), &target(), now());
        assert_eq!(record.final_decision, FinalDecision::Approved);
        assert!(record.size.unwrap() > 0.0);
        assert_eq!(record.strategic_input.unwrap().target_progress, 0.0);
    }

    #[test]
    fn weak_buy_behind_weekly_target_is_resized() {
        let record = engine().decide(&signal(Direction::Buy, 0.3), &snapshot(0.0, 0.1), &target(), now());
        assert_eq!(record.final_decision, FinalDecision::Resized);
    }

    #[test]
    fn buy_within_margin_of_weekly_target_is_resized() {
        // weekly target = 1866.67; 95% of it is inside the 10% margin.
        let progress = target().weekly() * 0.95;
        let record = engine().decide(&signal(Direction::Buy, 0.9), &snapshot(progress, 0.1), &target(), now());
        assert_eq!(record.final_decision, FinalDecision::Resized);
    }

    #[test]
    fn sell_beyond_monthly_target_is_approved_before_resize() {
        let record = engine().decide(&signal(Direction::Sell, 0.2), &snapshot(12_000.0, 0.1), &target(), now());
        assert_eq!(record.final_decision, FinalDecision::Approved);
        assert!(record.reason.contains("monthly target"));
    }

    #[test]
    fn hold_is_rejected() {
        let record = engine().decide(&signal(Direction::Hold, 0.0), &snapshot(0.0, 0.1), &target(), now());
        assert_eq!(record.final_decision, FinalDecision::Rejected);
        assert_eq!(record.reason, "no actionable signal");
    }

    #[test]
    fn sell_of_fully_reserved_asset_is_rejected_even_past_target() {
        let risk = RiskPolicy::default().with_reserve("BTC", 0.1);
        let engine = DecisionEngine::new(risk, DecisionPolicy::default());
        let record = engine.decide(&signal(Direction::Sell, 0.9), &snapshot(12_000.0, 0.1), &target(), now());
        assert_eq!(record.final_decision, FinalDecision::Rejected);
        assert!(record.reason.contains("protected reserve"));
    }

    #[test]
    fn sell_size_is_capped_by_sellable_excess() {
        let risk = RiskPolicy {
            max_risk_fraction_per_trade: 0.5,
            ..RiskPolicy::default()
        }
        .with_reserve("BTC", 0.09);
        let engine = DecisionEngine::new(risk, DecisionPolicy::default());
        let record = engine.decide(&signal(Direction::Sell, 0.5), &snapshot(0.0, 0.1), &target(), now());
        assert_eq!(record.final_decision, FinalDecision::Resized);
        assert!(record.size.unwrap() <= 0.01 + 1e-9);
    }

    #[test]
    fn buy_is_capped_by_free_quote_cash() {
        let risk = RiskPolicy {
            max_risk_fraction_per_trade: 0.5,
            ..RiskPolicy::default()
        };
        let engine = DecisionEngine::new(risk, DecisionPolicy::default());
        // 600k equity, but only 100k of it is ZAR.
        let record = engine.decide(&signal(Direction::Buy, 0.9), &snapshot(0.0, 0.5), &target(), now());
        assert_eq!(record.final_decision, FinalDecision::Approved);
        let size = record.size.unwrap();
        assert!(size * 1_000_000.0 <= 100_000.0 + 1e-6);
        assert!((size - 0.1).abs() < 1e-7);
    }

    #[test]
    fn buy_with_quote_fully_reserved_is_rejected() {
        let risk = RiskPolicy::default().with_reserve("ZAR", 100_000.0);
        let engine = DecisionEngine::new(risk, DecisionPolicy::default());
        let record = engine.decide(&signal(Direction::Buy, 0.9), &snapshot(0.0, 0.1), &target(), now());
        assert_eq!(record.final_decision, FinalDecision::Rejected);
        assert!(record.reason.starts_with("sizing failed"));
        assert!(record.size.is_none());
    }

    #[test]
    fn missing_price_is_rejected() {
        let mut snap = snapshot(0.0, 0.1);
        snap.holdings.remove("BTC");
        let record = engine().decide(&signal(Direction::Buy, 0.9), &snap, &target(), now());
        assert_eq!(record.final_decision, FinalDecision::Rejected);
    }

    #[test]
    fn every_evaluation_appends_one_record() {
        let mut engine = engine();
        let snap = snapshot(0.0, 0.1);
        for (i, direction) in [Direction::Buy, Direction::Hold, Direction::Sell].iter().enumerate() {
            engine.evaluate(&signal(*direction, 0.7), &snap, &target(), now() + Duration::minutes(i as i64));
            assert_eq!(engine.log().len(), i + 1);
        }
        let recent = engine.get_decision_log(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].signal.direction(), Direction::Sell);
        assert_eq!(recent[1].signal.direction(), Direction::Hold);
    }

    #[test]
    fn log_is_bounded() {
        let policy = DecisionPolicy {
            log_capacity: 3,
            ..DecisionPolicy::default()
        };
        let mut engine = DecisionEngine::new(RiskPolicy::default(), policy);
        let snap = snapshot(0.0, 0.1);
        for i in 0..5 {
            engine.evaluate(&signal(Direction::Hold, 0.0), &snap, &target(), now() + Duration::minutes(i));
        }
        assert_eq!(engine.log().len(), 3);
        let recent = engine.get_decision_log(10);
        assert_eq!(recent[0].timestamp, now() + Duration::minutes(4));
        assert_eq!(recent[2].timestamp, now() + Duration::minutes(2));
    }

    #[test]
    fn decision_record_serializes_uppercase_verdict() {
        let record = DecisionRecord::rejected(&signal(Direction::Buy, 0.4), "collaborator timeout", now());
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"final_decision\":\"REJECTED\""));
        assert!(json.contains("\"direction\":\"BUY\""));
    }
}
