//! File I/O for model configurations.

pub mod config;

pub use config::{config_from_str, config_to_string, read_config, write_config};
