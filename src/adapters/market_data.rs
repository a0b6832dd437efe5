//! Market data source selection with optional synthetic fallback.

use chrono::{DateTime, Utc};
use tracing::warn;

use super::synthetic_adapter::SyntheticAdapter;
use crate::domain::error::GatetraderError;
use crate::domain::ohlcv::{PriceBar, Timeframe};
use crate::ports::data_port::DataPort;

pub enum MarketDataSource {
    Live(Box<dyn DataPort>),
    Synthetic(SyntheticAdapter),
    /// Serve synthetic bars when the live source has nothing for a symbol.
    LiveWithFallback {
        live: Box<dyn DataPort>,
        synthetic: SyntheticAdapter,
    },
}

fn falls_back(err: &GatetraderError) -> bool {
    matches!(
        err,
        GatetraderError::NoData { .. } | GatetraderError::CollaboratorUnavailable { .. }
    )
}

impl DataPort for MarketDataSource {
    fn get_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PriceBar>, GatetraderError> {
        match self {
            MarketDataSource::Live(live) => live.get_ohlcv(symbol, timeframe, since, limit),
            MarketDataSource::Synthetic(synthetic) => {
                synthetic.get_ohlcv(symbol, timeframe, since, limit)
            }
            MarketDataSource::LiveWithFallback { live, synthetic } => {
                match live.get_ohlcv(symbol, timeframe, since, limit) {
                    Ok(bars) if !bars.is_empty() => Ok(bars),
                    Ok(_) => {
                        warn!(symbol, "live source returned no bars, using synthetic data");
                        synthetic.get_ohlcv(symbol, timeframe, since, limit)
                    }
                    Err(e) if falls_back(&e) => {
                        warn!(symbol, error = %e, "live source failed, using synthetic data");
                        synthetic.get_ohlcv(symbol, timeframe, since, limit)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    fn list_symbols(&self) -> Result<Vec<String>, GatetraderError> {
        match self {
            MarketDataSource::Live(live) | MarketDataSource::LiveWithFallback { live, .. } => {
                live.list_symbols()
            }
            MarketDataSource::Synthetic(synthetic) => synthetic.list_symbols(),
        }
    }
}
