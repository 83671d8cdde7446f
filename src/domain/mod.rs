//! Core domain types and logic.

pub mod backtest;
pub mod config_validation;
pub mod data_source;
pub mod error;
pub mod exit_sim;
pub mod live;
pub mod metrics;
pub mod ohlcv;
pub mod position;
pub mod series_store;
pub mod signal;
pub mod strategy;
pub mod universe;
pub mod volume_breakout;
