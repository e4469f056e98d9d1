//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{MbError, Result};
use std::path::{Path, PathBuf};

/// Default location of the config file (`~/.mb/config.yaml`).
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mb")
        .join("config.yaml")
}

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(MbError::Config)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            MbError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from a YAML file, falling back to defaults when it does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| MbError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| MbError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `locks.data_bag` must be non-empty
    /// - `locks.stale_minutes` must be positive
    /// - `ssh.timeout_seconds` must be positive
    pub fn validate(&self) -> Result<()> {
        if self.locks.data_bag.trim().is_empty() {
            return Err(MbError::Config(
                "config validation failed: locks.data_bag must not be empty".to_string(),
            ));
        }

        if self.locks.stale_minutes == 0 {
            return Err(MbError::Config(
                "config validation failed: locks.stale_minutes must be greater than 0".to_string(),
            ));
        }

        if self.ssh.timeout_seconds == 0 {
            return Err(MbError::Config(
                "config validation failed: ssh.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
