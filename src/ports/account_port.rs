//! Live account state port.

use crate::domain::decision::PortfolioSnapshot;
use crate::domain::error::GatetraderError;

pub trait AccountPort: Send + Sync {
    fn get_portfolio_snapshot(&self) -> Result<PortfolioSnapshot, GatetraderError>;
}
