//! Live approval path for one account.
//!
//! Approvals are serialized behind one mutex covering snapshot retrieval,
//! the decision, the log append and trade submission. Read-only collaborator
//! calls and the audit write run on a worker thread that is abandoned after
//! the policy timeout. Submission runs on the caller's thread with the
//! timeout handed to the bot as a deadline, so an order is never placed
//! behind a record that says it was not.

use chrono::Utc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::decision::{DecisionEngine, DecisionRecord, FinalDecision};
use super::error::GatetraderError;
use super::signal::{merge_signals, Signal};
use crate::ports::account_port::AccountPort;
use crate::ports::audit_port::AuditPort;
use crate::ports::target_port::TargetPort;
use crate::ports::trading_bot_port::TradingBotPort;

pub const TIMEOUT_REASON: &str = "collaborator timeout";

/// Runs `call` on a worker thread and waits at most `timeout` for it.
pub fn call_with_timeout<T, F>(
    collaborator: &str,
    timeout: Duration,
    call: F,
) -> Result<T, GatetraderError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, GatetraderError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // The receiver is gone if we already timed out.
        let _ = tx.send(call());
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(GatetraderError::CollaboratorTimeout {
            collaborator: collaborator.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(GatetraderError::CollaboratorUnavailable {
            collaborator: collaborator.to_string(),
            reason: "worker exited without answering".to_string(),
        }),
    }
}

fn rejection_reason(err: &GatetraderError) -> String {
    match err {
        GatetraderError::CollaboratorTimeout { .. } => TIMEOUT_REASON.to_string(),
        other => format!("collaborator unavailable: {}", other),
    }
}

pub struct TradingGate {
    engine: Mutex<DecisionEngine>,
    account: Arc<dyn AccountPort>,
    targets: Arc<dyn TargetPort>,
    bot: Arc<dyn TradingBotPort>,
    audit: Arc<dyn AuditPort>,
}

impl TradingGate {
    pub fn new(
        engine: DecisionEngine,
        account: Arc<dyn AccountPort>,
        targets: Arc<dyn TargetPort>,
        bot: Arc<dyn TradingBotPort>,
        audit: Arc<dyn AuditPort>,
    ) -> Self {
        TradingGate {
            engine: Mutex::new(engine),
            account,
            targets,
            bot,
            audit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, DecisionEngine> {
        self.engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Decides on `signal`, submits the trade when approved or resized, and
    /// forwards the record to the audit sink. Exactly one record is logged.
    pub fn approve(&self, signal: &Signal) -> DecisionRecord {
        let mut engine = self.lock();
        let timeout = Duration::from_millis(engine.policy().timeout_ms);

        let account = Arc::clone(&self.account);
        let snapshot = call_with_timeout("account", timeout, move || account.get_portfolio_snapshot());
        let targets = Arc::clone(&self.targets);
        let target = snapshot
            .and_then(|s| call_with_timeout("target store", timeout, move || targets.get_target()).map(|t| (s, t)));

        let mut record = match target {
            Ok((snapshot, target)) => engine.decide(signal, &snapshot, &target, Utc::now()),
            Err(e) => {
                warn!(symbol = %signal.symbol(), error = %e, "rejecting: collaborator failed");
                DecisionRecord::rejected(signal, rejection_reason(&e), Utc::now())
            }
        };

        if let (true, Some(size)) = (record.final_decision.is_actionable(), record.size) {
            let direction = signal.direction();
            let started = Instant::now();
            match self.bot.submit_trade(signal.symbol(), direction, size, timeout) {
                Ok(order) => {
                    if started.elapsed() > timeout {
                        warn!(symbol = %signal.symbol(), order = %order, "trading bot answered after its deadline");
                    }
                    info!(symbol = %signal.symbol(), %direction, size, order = %order, "trade submitted");
                }
                Err(e) => {
                    warn!(symbol = %signal.symbol(), error = %e, "submission failed");
                    record.final_decision = FinalDecision::Rejected;
                    record.reason = rejection_reason(&e);
                    record.size = None;
                }
            }
        }

        engine.append(record.clone());

        let audit = Arc::clone(&self.audit);
        let audited = record.clone();
        if let Err(e) = call_with_timeout("audit log", timeout, move || audit.record(&audited)) {
            warn!(error = %e, "audit sink did not accept decision record");
        }

        record
    }

    /// Blends a rule signal with a model prediction before deciding. Only
    /// agreeing directions can trade.
    pub fn approve_with_model(&self, rule: &Signal, model: &Signal) -> DecisionRecord {
        let merged = merge_signals(rule, model);
        debug!(symbol = %merged.symbol(), direction = %merged.direction(), "merged model signal");
        self.approve(&merged)
    }

    pub fn get_decision_log(&self, limit: usize) -> Vec<DecisionRecord> {
        self.lock().get_decision_log(limit)
    }
}
