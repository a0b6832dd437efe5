//! Sink for decision records.

use crate::domain::decision::DecisionRecord;
use crate::domain::error::GatetraderError;

pub trait AuditPort: Send + Sync {
    fn record(&self, record: &DecisionRecord) -> Result<(), GatetraderError>;
}
