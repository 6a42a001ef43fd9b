//! Core domain types and logic.

pub mod ohlcv;
pub mod price_history;
pub mod indicator;
pub mod signal;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod metrics;
pub mod backtest;
pub mod simulator;
pub mod ranking;
pub mod batch;
pub mod config;
pub mod error;
