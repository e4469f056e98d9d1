//! Bootstrapping hosts into an environment under its lock.

use super::remote::{ChefConnection, NodeQuerier};
use super::types::{BootstrapOptions, NodeBootstrapResult};
use super::worker::BootstrapWorker;
use crate::context::AppContext;
use crate::error::{MbError, Result};
use crate::job::{JobRecord, SpawnedJob};
use std::sync::Arc;
use tracing::info;

/// How the environment lock is taken for a bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Take the lock even if someone else holds it.
    pub force: bool,
    /// Release the lock when the bootstrap fails.
    pub unlock_on_failure: bool,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            force: false,
            unlock_on_failure: true,
        }
    }
}

/// Start a `bootstrap` job that locks `options.environment` and bootstraps
/// `hosts` inside the lock.
///
/// The job's result is the list of per-node results. If the environment is
/// locked by someone else the job fails with `ResourceLocked` naming the holder.
pub async fn bootstrap_environment(
    ctx: &AppContext,
    hosts: Vec<String>,
    options: BootstrapOptions,
    lock: LockOptions,
    querier: Arc<dyn NodeQuerier>,
    connection: Arc<dyn ChefConnection>,
) -> Result<SpawnedJob> {
    let locks = ctx.locks.clone();

    ctx.jobs
        .spawn("bootstrap", move |job| async move {
            let mutex = locks
                .mutex()
                .chef_environment(options.environment.clone())
                .force(lock.force)
                .unlock_on_failure(lock.unlock_on_failure)
                .job(&job)
                .build()?;

            info!(environment = %options.environment, hosts = hosts.len(), "Bootstrapping environment");
            let worker = BootstrapWorker::new(hosts, options, querier, connection).with_job(job);

            match mutex.synchronize(|| worker.run()).await? {
                Some(results) => Ok(results),
                None => Err(mutex.locked_error().await),
            }
        })
        .await
}

/// Read the per-node results back out of a finished bootstrap job record.
pub fn results_of(record: &JobRecord) -> Result<Vec<NodeBootstrapResult>> {
    match &record.result {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| MbError::UserError(format!("unexpected bootstrap result: {}", e))),
        None => Ok(Vec::new()),
    }
}
