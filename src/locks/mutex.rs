//! Distributed mutex over the shared data bag store.
//!
//! Locking a resource writes a lock item keyed by the slug of `type:name`;
//! unlocking deletes it. Acquisition reads the current item and then writes
//! with no compare-and-swap in between, so two clients that both read
//! "absent" will both write and both believe they hold the lock. Only a store
//! with atomic create-if-absent closes that window.

use super::item::LockItem;
use super::registry::LockRegistry;
use super::store::DataBagStore;
use super::types::{LockIdentity, LockType, Ownership, valid_lock_types};
use crate::error::{MbError, Result};
use crate::job::{Job, WeakJob};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Environment variable that switches locking into test mode.
pub const MB_ENV_VAR: &str = "MB_ENV";

/// Whether the process runs under a test harness (`MB_ENV=test`).
///
/// In test mode every mutex built from a context created now reports
/// `lock`/`unlock` as successful without touching the store.
pub fn externally_testing() -> bool {
    std::env::var(MB_ENV_VAR).is_ok_and(|v| v == "test")
}

/// Everything a mutex needs to talk to the store and the registry.
#[derive(Clone)]
pub struct LockContext {
    store: Arc<dyn DataBagStore>,
    registry: LockRegistry,
    identity: LockIdentity,
    data_bag: String,
    test_mode: bool,
}

impl fmt::Debug for LockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockContext")
            .field("identity", &self.identity)
            .field("data_bag", &self.data_bag)
            .field("test_mode", &self.test_mode)
            .finish()
    }
}

impl LockContext {
    /// Create a context with its own lock registry.
    ///
    /// Test mode is read from the environment at this point.
    pub fn new(
        store: Arc<dyn DataBagStore>,
        identity: LockIdentity,
        data_bag: impl Into<String>,
    ) -> Self {
        Self {
            store,
            registry: LockRegistry::start(),
            identity,
            data_bag: data_bag.into(),
            test_mode: externally_testing(),
        }
    }

    /// Override test mode.
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    pub fn store(&self) -> &Arc<dyn DataBagStore> {
        &self.store
    }

    pub fn registry(&self) -> &LockRegistry {
        &self.registry
    }

    pub fn identity(&self) -> &LockIdentity {
        &self.identity
    }

    pub fn data_bag(&self) -> &str {
        &self.data_bag
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    /// Start building a mutex bound to this context.
    pub fn mutex(&self) -> MutexBuilder {
        MutexBuilder::new(self.clone())
    }
}

/// Builder for [`ChefMutex`].
#[derive(Debug)]
pub struct MutexBuilder {
    ctx: LockContext,
    lock_type: Option<String>,
    name: String,
    force: bool,
    unlock_on_failure: bool,
    job: Option<WeakJob>,
}

impl MutexBuilder {
    fn new(ctx: LockContext) -> Self {
        Self {
            ctx,
            lock_type: None,
            name: String::new(),
            force: false,
            unlock_on_failure: true,
            job: None,
        }
    }

    /// Lock the named environment.
    pub fn chef_environment(self, name: impl Into<String>) -> Self {
        self.resource(LockType::Environment.as_str(), name)
    }

    /// Lock a resource given its type name, as read from user input.
    pub fn resource(mut self, lock_type: impl Into<String>, name: impl Into<String>) -> Self {
        self.lock_type = Some(lock_type.into());
        self.name = name.into();
        self
    }

    /// Skip ownership checks on both lock and unlock.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Whether `synchronize` releases the lock when its block fails.
    pub fn unlock_on_failure(mut self, unlock_on_failure: bool) -> Self {
        self.unlock_on_failure = unlock_on_failure;
        self
    }

    /// Report lock progress into `job`, and stop work when it is terminated.
    pub fn job(mut self, job: &Job) -> Self {
        self.job = Some(job.downgrade());
        self
    }

    pub fn build(self) -> Result<ChefMutex> {
        let lock_type = match self.lock_type.as_deref() {
            Some(kind) => LockType::from_str(kind)?,
            None => return Err(MbError::InvalidLockType(valid_lock_types())),
        };

        Ok(ChefMutex {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                lock_type,
                name: self.name,
                force: self.force,
                unlock_on_failure: self.unlock_on_failure,
                job: self.job,
                ctx: self.ctx,
                serial: Mutex::new(()),
            }),
        })
    }
}

struct Inner {
    id: Uuid,
    lock_type: LockType,
    name: String,
    force: bool,
    unlock_on_failure: bool,
    job: Option<WeakJob>,
    ctx: LockContext,
    // One lock/unlock request at a time per mutex
    serial: Mutex<()>,
}

/// Handle to one distributed mutex. Clones share the same mutex.
#[derive(Clone)]
pub struct ChefMutex {
    inner: Arc<Inner>,
}

impl fmt::Display for ChefMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.inner.lock_type, self.inner.name)
    }
}

impl fmt::Debug for ChefMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChefMutex")
            .field("resource", &self.to_string())
            .field("force", &self.inner.force)
            .field("unlock_on_failure", &self.inner.unlock_on_failure)
            .finish()
    }
}

impl ChefMutex {
    /// Process-unique id of this mutex handle.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn lock_type(&self) -> LockType {
        self.inner.lock_type
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn force(&self) -> bool {
        self.inner.force
    }

    pub fn unlock_on_failure(&self) -> bool {
        self.inner.unlock_on_failure
    }

    /// Id of the lock item in the data bag.
    pub fn data_bag_id(&self) -> String {
        super::item::lock_item_id(self.inner.lock_type, &self.inner.name)
    }

    fn ctx(&self) -> &LockContext {
        &self.inner.ctx
    }

    /// Try to take the lock.
    ///
    /// Without `force`, an existing item decides the outcome: ours means the
    /// lock is already held (true), anyone else's means it is not (false).
    /// With `force`, the item is always overwritten.
    pub async fn lock(&self) -> Result<bool> {
        if self.ctx().test_mode {
            return Ok(true);
        }

        let _serial = self.inner.serial.lock().await;
        info!("Locking {}", self);
        self.set_job_status(format!("Locking {}", self)).await;

        self.attempt_lock().await
    }

    /// Try to release the lock.
    ///
    /// Without `force`, only an item written by this client and process is
    /// deleted. With `force`, the item is deleted whoever holds it.
    pub async fn unlock(&self) -> Result<bool> {
        if self.ctx().test_mode {
            return Ok(true);
        }

        let _serial = self.inner.serial.lock().await;
        info!("Unlocking {}", self);
        self.set_job_status(format!("Unlocking {}", self)).await;

        self.attempt_unlock().await
    }

    /// Release a lock this process is still registered as holding.
    pub(crate) async fn release(&self) -> Result<bool> {
        let _serial = self.inner.serial.lock().await;
        self.attempt_unlock().await
    }

    /// Run `block` while holding the lock.
    ///
    /// Returns `Ok(None)` without running the block if another client holds
    /// the lock. When the block fails, or the bound job is terminated while it
    /// runs, the failure is reported to the job, the lock is released unless
    /// `unlock_on_failure` is off, and the error is returned.
    pub async fn synchronize<F, Fut, T>(&self, block: F) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.lock().await {
            Ok(true) => {}
            Ok(false) => {
                let locked = self.locked_error().await;
                warn!("{}", locked);
                self.report_job_failure(&locked).await;
                return Ok(None);
            }
            Err(err) => {
                error!(lock = %self, error = %err, "error in lock sync");
                self.report_job_failure(&err).await;
                return Err(err);
            }
        }

        let cancel = self
            .inner
            .job
            .as_ref()
            .map(WeakJob::cancellation_token)
            .unwrap_or_default();

        let outcome = tokio::select! {
            outcome = block() => outcome,
            _ = cancel.cancelled() => {
                Err(MbError::JobTerminated(format!("terminated while holding {}", self)))
            }
        };

        match outcome {
            Ok(value) => {
                self.unlock().await?;
                Ok(Some(value))
            }
            Err(err) => {
                error!(lock = %self, error = %err, "error in lock sync");
                self.report_job_failure(&err).await;

                if self.inner.unlock_on_failure {
                    if let Err(unlock_err) = self.unlock().await {
                        warn!(lock = %self, error = %unlock_err, "failed to release lock after error");
                    }
                } else {
                    warn!(lock = %self, "leaving lock in place after error");
                }
                Err(err)
            }
        }
    }

    /// The lock item currently stored for this resource.
    pub async fn current_holder(&self) -> Result<Option<LockItem>> {
        self.read().await
    }

    /// How the stored lock item relates to this process.
    pub async fn ownership(&self) -> Result<Ownership> {
        Ok(self.ownership_of(self.read().await?.as_ref()))
    }

    fn ownership_of(&self, item: Option<&LockItem>) -> Ownership {
        let identity = &self.ctx().identity;
        match item {
            None => Ownership::Absent,
            Some(item)
                if item.client_name == identity.client_name
                    && item.process_id == identity.process_id =>
            {
                Ownership::Ours
            }
            Some(_) => Ownership::Theirs,
        }
    }

    async fn attempt_lock(&self) -> Result<bool> {
        if !self.inner.force {
            if let Some(current) = self.read().await? {
                let ours = self.ownership_of(Some(&current)) == Ownership::Ours;
                if ours {
                    self.track(true).await;
                }
                return Ok(ours);
            }
        }

        self.write().await
    }

    async fn attempt_unlock(&self) -> Result<bool> {
        if !self.inner.force {
            let current = self.read().await?;
            if self.ownership_of(current.as_ref()) != Ownership::Ours {
                return Ok(false);
            }
        }

        self.delete().await
    }

    async fn read(&self) -> Result<Option<LockItem>> {
        let ctx = self.ctx();
        match ctx.store.find_item(&ctx.data_bag, &self.data_bag_id()).await? {
            Some(value) => LockItem::from_value(&value).map(Some),
            None => Ok(None),
        }
    }

    async fn write(&self) -> Result<bool> {
        let result = self.try_write().await;
        match result {
            Ok(true) => self.track(true).await,
            _ => self.track(false).await,
        }
        result
    }

    async fn try_write(&self) -> Result<bool> {
        let ctx = self.ctx();
        if !ctx.store.container_exists(&ctx.data_bag).await? {
            ctx.store.create_container(&ctx.data_bag).await?;
        }

        let item = LockItem::new(self.inner.lock_type, &self.inner.name, &ctx.identity);
        ctx.store.save_item(&ctx.data_bag, item.to_value()?).await
    }

    async fn delete(&self) -> Result<bool> {
        let result = self.try_delete().await;
        self.track(false).await;
        result
    }

    async fn try_delete(&self) -> Result<bool> {
        let ctx = self.ctx();
        if !ctx.store.container_exists(&ctx.data_bag).await? {
            return Ok(true);
        }
        ctx.store.delete_item(&ctx.data_bag, &self.data_bag_id()).await
    }

    async fn track(&self, held: bool) {
        let registry = &self.ctx().registry;
        let tracked = if held {
            registry.register(self).await
        } else {
            registry.unregister(self).await
        };
        if let Err(e) = tracked {
            warn!(lock = %self, error = %e, "lock registry unavailable");
        }
    }

    /// `ResourceLocked` error naming the current holder.
    pub(crate) async fn locked_error(&self) -> MbError {
        let message = match self.read().await {
            Ok(Some(holder)) => format!(
                "Resource {} locked by {} since {} (PID {})",
                holder.id,
                holder.client_name,
                holder.time.to_rfc3339(),
                holder.process_id
            ),
            _ => format!("Resource {} locked", self.data_bag_id()),
        };
        MbError::ResourceLocked(message)
    }

    fn job(&self) -> Option<Job> {
        self.inner.job.as_ref().and_then(WeakJob::upgrade)
    }

    async fn set_job_status(&self, status: String) {
        if let Some(job) = self.job() {
            job.set_status(status).await;
        }
    }

    async fn report_job_failure(&self, err: &MbError) {
        if let Some(job) = self.job() {
            job.report_failure(err).await;
        }
    }
}
