//! Remote data bag store adapter.
//!
//! The lock protocol only needs a key/value item store grouped into named
//! containers (data bags). There is no transaction spanning a read and a
//! following write: callers that read-then-write can interleave with other
//! clients doing the same.

use crate::error::{MbError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Item store reachable by every client that coordinates through it.
#[async_trait]
pub trait DataBagStore: Send + Sync {
    /// Create the named data bag. Creating an existing bag is not an error.
    async fn create_container(&self, bag: &str) -> Result<()>;

    /// Whether the named data bag exists.
    async fn container_exists(&self, bag: &str) -> Result<bool>;

    /// Read one item. Returns `None` if the bag or the item does not exist.
    async fn find_item(&self, bag: &str, id: &str) -> Result<Option<Value>>;

    /// Create or overwrite the item keyed by its `id` field.
    ///
    /// Returns `false` if the store declined the write.
    async fn save_item(&self, bag: &str, item: Value) -> Result<bool>;

    /// Delete one item. Returns `false` if there was nothing to delete.
    async fn delete_item(&self, bag: &str, id: &str) -> Result<bool>;

    /// Every item in the bag, in id order. A missing bag has no items.
    async fn list_items(&self, bag: &str) -> Result<Vec<Value>>;
}

/// Extract the `id` field every data bag item must carry.
pub(crate) fn item_id(item: &Value) -> Result<String> {
    item.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| MbError::Store("data bag item is missing an 'id' field".to_string()))
}

/// In-process data bag store.
///
/// By default `save_item` overwrites like the remote store does. A store
/// built with [`MemoryStore::create_if_absent`] refuses to overwrite an
/// existing item, which models a store offering atomic create.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bags: Mutex<BTreeMap<String, BTreeMap<String, Value>>>,
    exclusive_create: bool,
}

impl MemoryStore {
    /// Store with create-or-overwrite writes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose writes fail (return `false`) when the item already exists.
    pub fn create_if_absent() -> Self {
        Self {
            bags: Mutex::default(),
            exclusive_create: true,
        }
    }
}

#[async_trait]
impl DataBagStore for MemoryStore {
    async fn create_container(&self, bag: &str) -> Result<()> {
        self.bags.lock().await.entry(bag.to_string()).or_default();
        Ok(())
    }

    async fn container_exists(&self, bag: &str) -> Result<bool> {
        Ok(self.bags.lock().await.contains_key(bag))
    }

    async fn find_item(&self, bag: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .bags
            .lock()
            .await
            .get(bag)
            .and_then(|items| items.get(id))
            .cloned())
    }

    async fn save_item(&self, bag: &str, item: Value) -> Result<bool> {
        let id = item_id(&item)?;
        let mut bags = self.bags.lock().await;
        let items = bags
            .get_mut(bag)
            .ok_or_else(|| MbError::Store(format!("data bag '{}' does not exist", bag)))?;

        if self.exclusive_create && items.contains_key(&id) {
            return Ok(false);
        }

        items.insert(id, item);
        Ok(true)
    }

    async fn delete_item(&self, bag: &str, id: &str) -> Result<bool> {
        Ok(self
            .bags
            .lock()
            .await
            .get_mut(bag)
            .map(|items| items.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn list_items(&self, bag: &str) -> Result<Vec<Value>> {
        Ok(self
            .bags
            .lock()
            .await
            .get(bag)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default())
    }
}
