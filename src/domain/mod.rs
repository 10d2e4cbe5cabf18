//! Core domain types and logic.

pub mod ohlcv;
pub mod store;
pub mod rolling;
pub mod signal;
pub mod composite;
pub mod action;
pub mod backtest;
pub mod metrics;
pub mod monitor;
pub mod loader;
pub mod sweep;
pub mod universe;
pub mod config;
pub mod config_validation;
pub mod error;
