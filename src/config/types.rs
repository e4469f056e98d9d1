//! Configuration sections and defaults for mb.
//!
//! Each section of the YAML file maps to one struct here. Every field has a
//! default so a partial (or empty) file still produces a usable config.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Data bag holding lock items when none is configured.
pub const DEFAULT_LOCKS_DATA_BAG: &str = "_motherbrain_locks_";

// Default value functions for serde
pub(crate) fn default_client_name() -> String {
    crate::locks::default_client_name()
}
pub(crate) fn default_server_url() -> String {
    "https://localhost".to_string()
}
pub(crate) fn default_validator_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chef")
        .join("validation.pem")
}
pub(crate) fn default_ssh_user() -> String {
    "root".to_string()
}
pub(crate) fn default_ssh_timeout_seconds() -> u64 {
    600
}
pub(crate) fn default_data_bag() -> String {
    DEFAULT_LOCKS_DATA_BAG.to_string()
}
pub(crate) fn default_store_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mb")
        .join("data_bags")
}
pub(crate) fn default_stale_minutes() -> u32 {
    120
}
pub(crate) fn default_termination_grace_seconds() -> u64 {
    10
}
pub(crate) fn default_full_command() -> String {
    "knife bootstrap {host} --ssh-user {user} --environment {environment} --validation-key {validator_path}"
        .to_string()
}
pub(crate) fn default_registered_as_command() -> String {
    "knife search node fqdn:{host} --attribute name --format text".to_string()
}
pub(crate) fn default_put_secret_command() -> String {
    "scp /etc/chef/encrypted_data_bag_secret {user}@{host}:/etc/chef/encrypted_data_bag_secret"
        .to_string()
}
pub(crate) fn default_chef_run_command() -> String {
    "ssh {user}@{host} {sudo} chef-client".to_string()
}
pub(crate) fn default_merge_data_command() -> String {
    "knife exec --exec \"n = nodes.show('{node_name}'); n.normal_attrs.merge!(JSON.parse('{attributes}')); n.save\""
        .to_string()
}
pub(crate) fn default_log_level() -> String {
    "info".to_string()
}

/// Identity and endpoint of the configuration server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChefConfig {
    /// Client name written into lock items; identifies this operator.
    pub client_name: String,

    /// URL of the configuration server (informational for the shell connector).
    pub server_url: String,

    /// Validator key required for a full bootstrap.
    pub validator_path: PathBuf,
}

impl Default for ChefConfig {
    fn default() -> Self {
        Self {
            client_name: default_client_name(),
            server_url: default_server_url(),
            validator_path: default_validator_path(),
        }
    }
}

/// Remote access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// User for remote commands.
    pub user: String,

    /// Private keys passed with `-i` to `ssh` and `scp` commands.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<PathBuf>,

    /// Whether `{sudo}` in a command template expands to `sudo` (otherwise `env`).
    pub sudo: bool,

    /// Maximum time a single remote command may run before it is killed.
    pub timeout_seconds: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: default_ssh_user(),
            keys: Vec::new(),
            sudo: true,
            timeout_seconds: default_ssh_timeout_seconds(),
        }
    }
}

/// Where lock items live and when they are reported as stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocksConfig {
    /// Name of the data bag holding lock items.
    pub data_bag: String,

    /// Root directory of the shared data bag store.
    pub store_path: PathBuf,

    /// Minutes after which a lock is reported as stale.
    pub stale_minutes: u32,
}

impl Default for LocksConfig {
    fn default() -> Self {
        Self {
            data_bag: default_data_bag(),
            store_path: default_store_path(),
            stale_minutes: default_stale_minutes(),
        }
    }
}

/// Job supervision settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Seconds a terminated job gets to release its locks before it is aborted.
    pub termination_grace_seconds: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            termination_grace_seconds: default_termination_grace_seconds(),
        }
    }
}

/// Command templates used by the shell connector.
///
/// Templates use `{name}` placeholders; available variables are `host`,
/// `node_name`, `user`, `validator_path`, `environment`, and `attributes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Installs and registers a node that the server does not know yet.
    pub full_command: String,

    /// Prints the node name a host is registered as (empty output if none).
    pub registered_as_command: String,

    /// Places the secret credential file on a host.
    pub put_secret_command: String,

    /// Triggers a configuration run on a host.
    pub chef_run_command: String,

    /// Merges attributes into a registered node's record.
    pub merge_data_command: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            full_command: default_full_command(),
            registered_as_command: default_registered_as_command(),
            put_secret_command: default_put_secret_command(),
            chef_run_command: default_chef_run_command(),
            merge_data_command: default_merge_data_command(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when `MB_LOG` is unset (e.g. `info`, `mb=debug`).
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
