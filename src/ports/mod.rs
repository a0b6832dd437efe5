//! Port traits: the boundary between the domain and its collaborators.

pub mod account_port;
pub mod audit_port;
pub mod config_port;
pub mod data_port;
pub mod report_port;
pub mod target_port;
pub mod trading_bot_port;
