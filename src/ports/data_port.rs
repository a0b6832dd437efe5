//! Market data port.

use chrono::{DateTime, Utc};

use crate::domain::error::GatetraderError;
use crate::domain::ohlcv::{PriceBar, Timeframe};

/// Source of historical bars. Implementations must be shareable across the
/// comparator's worker threads.
pub trait DataPort: Send + Sync {
    /// Bars for `symbol` opening at or after `since`, oldest first, at most `limit`.
    fn get_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PriceBar>, GatetraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, GatetraderError>;
}
