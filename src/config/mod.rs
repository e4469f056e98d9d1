//! Configuration model for mb.
//!
//! This module defines the Config struct that represents `~/.mb/config.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for optional fields, and validation of config values.

mod model;
mod operations;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use model::Config;
pub use operations::default_config_path;
pub use types::{
    BootstrapConfig, ChefConfig, DEFAULT_LOCKS_DATA_BAG, JobsConfig, LocksConfig, LogConfig,
    SshConfig,
};
