//! regimetrader: regime-aware single-asset strategy backtester.
//!
//! Hexagonal architecture: simulation logic in [`domain`], collaborator
//! traits in [`ports`], file-backed implementations in [`adapters`] and the
//! command line in [`cli`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
