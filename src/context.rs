//! Application context: the services every operation shares.
//!
//! Built once at process start from the loaded config and passed by
//! reference to commands. Holds the lock context (store, identity, and lock
//! registry) and the job manager.

use crate::config::Config;
use crate::error::Result;
use crate::job::JobManager;
use crate::locks::{
    DataBagStore, FsStore, LockContext, LockIdentity, LockInfo, MutexBuilder, list_locks,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Shared services for one mb process.
#[derive(Clone, Debug)]
pub struct AppContext {
    pub config: Config,
    pub locks: LockContext,
    pub jobs: JobManager,
}

impl AppContext {
    /// Build a context around `store`. Must be called within a tokio runtime.
    pub fn new(config: Config, store: Arc<dyn DataBagStore>) -> Self {
        let identity = LockIdentity::current(config.chef.client_name.clone());
        let locks = LockContext::new(store, identity, config.locks.data_bag.clone());
        let jobs = JobManager::start(Duration::from_secs(config.jobs.termination_grace_seconds));

        if locks.test_mode() {
            debug!("test mode: locks are not written to the store");
        }

        Self {
            config,
            locks,
            jobs,
        }
    }

    /// Build a context backed by the shared directory in `locks.store_path`.
    pub fn from_config(config: Config) -> Self {
        let store = Arc::new(FsStore::new(&config.locks.store_path));
        Self::new(config, store)
    }

    /// Start building a mutex for this process.
    pub fn mutex(&self) -> MutexBuilder {
        self.locks.mutex()
    }

    /// Every lock item in the configured data bag.
    pub async fn list_locks(&self) -> Result<Vec<LockInfo>> {
        list_locks(
            self.locks.store().as_ref(),
            self.locks.data_bag(),
            self.config.locks.stale_minutes,
        )
        .await
    }

    /// Stop active jobs and release every lock this process still holds.
    ///
    /// Jobs get the termination grace period to release their own locks; the
    /// registry then releases whatever is left. Returns how many locks the
    /// registry released.
    pub async fn shutdown(&self) -> Result<usize> {
        let terminated = self.jobs.terminate_active().await?;
        if terminated > 0 {
            info!(jobs = terminated, "Terminating active jobs");
            self.wait_for_jobs(self.jobs.termination_grace()).await?;
        }

        self.locks.registry().shutdown().await
    }

    async fn wait_for_jobs(&self, grace: Duration) -> Result<()> {
        let deadline = Instant::now() + grace;
        loop {
            let active = self.jobs.active().await?;
            if active.is_empty() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(jobs = active.len(), "jobs still running after termination grace");
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::MemoryStore;

    fn test_context(store: Arc<MemoryStore>) -> AppContext {
        let mut config = Config::default();
        config.chef.client_name = "alice".to_string();
        config.jobs.termination_grace_seconds = 2;
        let mut ctx = AppContext::new(config, store);
        ctx.locks = ctx.locks.with_test_mode(false);
        ctx
    }

    #[tokio::test]
    async fn test_context_identity_from_config() {
        let ctx = test_context(Arc::new(MemoryStore::new()));
        assert_eq!(ctx.locks.identity().client_name, "alice");
        assert_eq!(ctx.locks.identity().process_id, std::process::id());
        assert_eq!(ctx.locks.data_bag(), "_motherbrain_locks_");
    }

    #[tokio::test]
    async fn test_shutdown_releases_locks_and_stops_jobs() {
        let store = Arc::new(MemoryStore::new());
        let ctx = test_context(store.clone());

        let mutex = ctx.mutex().chef_environment("prod").build().unwrap();
        assert!(mutex.lock().await.unwrap());

        let spawned = ctx
            .jobs
            .spawn("bootstrap", |job| async move {
                job.terminated().await;
                Ok(())
            })
            .await
            .unwrap();

        let released = ctx.shutdown().await.unwrap();

        assert_eq!(released, 1);
        assert!(ctx.list_locks().await.unwrap().is_empty());
        assert!(ctx.jobs.active().await.unwrap().is_empty());
        let record = spawned.wait().await.unwrap();
        assert!(record.error.unwrap().starts_with("incomplete:"));
    }
}
