//! Profit target store port.

use crate::domain::error::GatetraderError;
use crate::domain::target::Target;

pub trait TargetPort: Send + Sync {
    fn get_target(&self) -> Result<Target, GatetraderError>;

    fn update_target(&self, target: &Target) -> Result<(), GatetraderError>;
}
