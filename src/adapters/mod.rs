//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_report_adapter;
pub mod dry_run_bot;
pub mod file_config_adapter;
pub mod json_account_adapter;
pub mod json_target_adapter;
pub mod jsonl_audit_adapter;
pub mod market_data;
pub mod synthetic_adapter;
