//! Account snapshot read from a JSON file maintained by the exchange bridge.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::domain::decision::PortfolioSnapshot;
use crate::domain::error::GatetraderError;
use crate::ports::account_port::AccountPort;

pub struct JsonAccountAdapter {
    path: PathBuf,
}

impl JsonAccountAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl AccountPort for JsonAccountAdapter {
    fn get_portfolio_snapshot(&self) -> Result<PortfolioSnapshot, GatetraderError> {
        let content = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => GatetraderError::CollaboratorUnavailable {
                collaborator: "account".to_string(),
                reason: format!("{} not found", self.path.display()),
            },
            _ => e.into(),
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}
