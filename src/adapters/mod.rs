//! Concrete implementations of the ports, plus strategy document loading.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod strategy_file;
