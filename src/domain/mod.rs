//! Core domain types and logic.

pub mod ohlcv;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod indicator;
pub mod signal;
pub mod risk;
pub mod backtest;
pub mod metrics;
pub mod pipeline;
pub mod comparator;
pub mod target;
pub mod decision;
pub mod gate;
pub mod universe;
pub mod config_validation;
pub mod settings;
pub mod error;
