//! Bootstrap inputs, per-node results, and remote responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Options shared by every node of one bootstrap run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BootstrapOptions {
    /// Environment the nodes join.
    pub environment: String,

    /// Attributes merged into each registered node's record.
    #[serde(default)]
    pub attributes: Value,
}

/// A target host and the node name it is registered as, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapNode {
    pub hostname: String,
    pub node_name: Option<String>,
}

/// Which provisioning flow a node went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootstrapType {
    /// Install and register a node the server does not know.
    Full,
    /// Refresh the secret and re-run configuration on a known node.
    Partial,
}

impl fmt::Display for BootstrapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapType::Full => write!(f, "full"),
            BootstrapType::Partial => write!(f, "partial"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Ok,
    Error,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Ok => write!(f, "ok"),
            NodeStatus::Error => write!(f, "error"),
        }
    }
}

/// Outcome of bootstrapping one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeBootstrapResult {
    pub hostname: String,
    pub node_name: Option<String>,
    pub bootstrap_type: BootstrapType,
    pub status: NodeStatus,

    /// Empty on success, the failure description on error.
    pub message: String,
}

impl NodeBootstrapResult {
    pub fn ok(
        hostname: impl Into<String>,
        node_name: Option<String>,
        bootstrap_type: BootstrapType,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            node_name,
            bootstrap_type,
            status: NodeStatus::Ok,
            message: String::new(),
        }
    }

    pub fn error(
        hostname: impl Into<String>,
        node_name: Option<String>,
        bootstrap_type: BootstrapType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            node_name,
            bootstrap_type,
            status: NodeStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == NodeStatus::Ok
    }
}

impl fmt::Display for NodeBootstrapResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) [{}] {}",
            self.hostname,
            self.node_name.as_deref().unwrap_or("-"),
            self.bootstrap_type,
            self.status
        )?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message.trim_end())?;
        }
        Ok(())
    }
}

/// Captured result of a command run against one host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostResponse {
    pub host: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl HostResponse {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}
