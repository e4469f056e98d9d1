//! Remote collaborators used by the bootstrap worker.

use super::types::{BootstrapOptions, HostResponse};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Queries and commands aimed at individual hosts.
#[async_trait]
pub trait NodeQuerier: Send + Sync {
    /// Node name `host` is registered as on the configuration server.
    async fn registered_as(&self, host: &str) -> Result<Option<String>>;

    /// Place the secret credential file on `host`.
    ///
    /// Fails with [`MbError::RemoteFileCopy`](crate::error::MbError::RemoteFileCopy).
    async fn put_secret(&self, host: &str) -> Result<()>;

    /// Trigger a configuration run on `host`.
    ///
    /// Fails with [`MbError::RemoteCommand`](crate::error::MbError::RemoteCommand).
    async fn chef_run(&self, host: &str) -> Result<()>;
}

/// Operations against the configuration server.
#[async_trait]
pub trait ChefConnection: Send + Sync {
    /// Install and register `host`. A nonzero exit code is a response, not an
    /// error; a missing validator key is
    /// [`MbError::ValidatorNotFound`](crate::error::MbError::ValidatorNotFound).
    async fn bootstrap(&self, host: &str, options: &BootstrapOptions) -> Result<HostResponse>;

    /// Merge `attributes` into the stored record of `node_name`.
    async fn merge_data(&self, node_name: &str, attributes: &Value) -> Result<()>;
}
