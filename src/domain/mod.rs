//! Core domain types and logic.

pub mod aggregator;
pub mod backtest;
pub mod config;
pub mod config_validation;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod indicator;
pub mod instrument;
pub mod instrument_data;
pub mod ledger;
pub mod metrics;
pub mod ohlcv;
pub mod policy;
pub mod signal;
pub mod signal_window;
