//! Core domain types and logic: indicators, regime classification,
//! strategy evaluation and the backtest engine.

pub mod adaptive;
pub mod backtest;
pub mod batch;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod indicator;
pub mod indicator_helpers;
pub mod logic_eval;
pub mod logic_tree;
pub mod metrics;
pub mod ohlcv;
pub mod portfolio;
pub mod position;
pub mod regime;
pub mod strategy;
