//! Core domain types and logic.
//!
//! Pure computation only: bar aggregation, the trend oscillator, signal
//! detection, exit strategies and the single-position simulator. Data
//! loading and reporting live behind the traits in [`crate::ports`].

pub mod ohlcv;
pub mod period;
pub mod indicator;
pub mod signal;
pub mod summary;
pub mod exit;
pub mod strategy;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod metrics;
pub mod backtest;
pub mod config_validation;
pub mod error;
