use crate::config::DEFAULT_LOCKS_DATA_BAG;
use crate::error::{MbError, Result};
use crate::locks::{DataBagStore, LockContext, LockIdentity, MemoryStore};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};
use tokio::sync::Barrier;

static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Sets an environment variable for the life of the guard.
pub(crate) struct EnvGuard {
    key: &'static str,
    original: Option<String>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    pub(crate) fn set(key: &'static str, value: &str) -> Self {
        // The process environment is global. Lock it so tests don't race even
        // if a #[serial] annotation is missed.
        let lock = ENV_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::var(key).ok();
        unsafe { std::env::set_var(key, value) };
        Self {
            key,
            original,
            _lock: lock,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.original {
            Some(value) => unsafe { std::env::set_var(self.key, value) },
            None => unsafe { std::env::remove_var(self.key) },
        }
    }
}

/// Lock context for `client` in this process, with test mode off.
pub(crate) fn lock_context(store: Arc<dyn DataBagStore>, client: &str) -> LockContext {
    LockContext::new(store, LockIdentity::current(client), DEFAULT_LOCKS_DATA_BAG)
        .with_test_mode(false)
}

/// Lock context for `client` as if it ran in another process.
pub(crate) fn foreign_lock_context(store: Arc<dyn DataBagStore>, client: &str) -> LockContext {
    let identity = LockIdentity {
        client_name: client.to_string(),
        process_id: std::process::id().wrapping_add(1),
    };
    LockContext::new(store, identity, DEFAULT_LOCKS_DATA_BAG).with_test_mode(false)
}

/// Store that holds every reader at a barrier after `find_item`, forcing
/// concurrent acquirers to interleave between their read and their write.
pub(crate) struct GatedStore {
    pub(crate) inner: MemoryStore,
    gate: Barrier,
}

impl GatedStore {
    pub(crate) fn new(inner: MemoryStore, parties: usize) -> Self {
        Self {
            inner,
            gate: Barrier::new(parties),
        }
    }
}

#[async_trait]
impl DataBagStore for GatedStore {
    async fn create_container(&self, bag: &str) -> Result<()> {
        self.inner.create_container(bag).await
    }

    async fn container_exists(&self, bag: &str) -> Result<bool> {
        self.inner.container_exists(bag).await
    }

    async fn find_item(&self, bag: &str, id: &str) -> Result<Option<Value>> {
        let found = self.inner.find_item(bag, id).await;
        self.gate.wait().await;
        found
    }

    async fn save_item(&self, bag: &str, item: Value) -> Result<bool> {
        self.inner.save_item(bag, item).await
    }

    async fn delete_item(&self, bag: &str, id: &str) -> Result<bool> {
        self.inner.delete_item(bag, id).await
    }

    async fn list_items(&self, bag: &str) -> Result<Vec<Value>> {
        self.inner.list_items(bag).await
    }
}

/// Store whose writes and deletes can be switched to fail.
#[derive(Default)]
pub(crate) struct FlakyStore {
    pub(crate) inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MbError::Store("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DataBagStore for FlakyStore {
    async fn create_container(&self, bag: &str) -> Result<()> {
        self.inner.create_container(bag).await
    }

    async fn container_exists(&self, bag: &str) -> Result<bool> {
        self.inner.container_exists(bag).await
    }

    async fn find_item(&self, bag: &str, id: &str) -> Result<Option<Value>> {
        self.inner.find_item(bag, id).await
    }

    async fn save_item(&self, bag: &str, item: Value) -> Result<bool> {
        self.check()?;
        self.inner.save_item(bag, item).await
    }

    async fn delete_item(&self, bag: &str, id: &str) -> Result<bool> {
        self.check()?;
        self.inner.delete_item(bag, id).await
    }

    async fn list_items(&self, bag: &str) -> Result<Vec<Value>> {
        self.inner.list_items(bag).await
    }
}
