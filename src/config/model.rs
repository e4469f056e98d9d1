//! Config struct definition.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for mb.
///
/// This struct represents the contents of `~/.mb/config.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration server identity.
    pub chef: ChefConfig,

    /// Remote access.
    pub ssh: SshConfig,

    /// Lock storage and staleness.
    pub locks: LocksConfig,

    /// Job supervision.
    pub jobs: JobsConfig,

    /// Bootstrap command templates.
    pub bootstrap: BootstrapConfig,

    /// Logging.
    pub log: LogConfig,
}
