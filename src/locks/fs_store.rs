//! Data bag store on a shared directory.
//!
//! Layout: `<root>/<bag>/<id>.json`, one JSON document per item. Writes
//! replace the item file atomically, but a read followed by a write is not
//! atomic across clients, the same as the remote store.

use super::store::{DataBagStore, item_id};
use crate::error::{MbError, Result};
use crate::fs::atomic_write;
use async_trait::async_trait;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Data bag store rooted at a (typically shared) directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bag_dir(&self, bag: &str) -> PathBuf {
        self.root.join(bag)
    }

    fn item_path(&self, bag: &str, id: &str) -> PathBuf {
        self.bag_dir(bag).join(format!("{}.json", id))
    }
}

fn read_item(path: &Path) -> Result<Option<Value>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(MbError::Store(format!(
                "failed to read item '{}': {}",
                path.display(),
                e
            )));
        }
    };

    serde_json::from_str(&content).map(Some).map_err(|e| {
        MbError::Store(format!("failed to parse item '{}': {}", path.display(), e))
    })
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MbError::Store(format!("store task failed: {}", e)))?
}

#[async_trait]
impl DataBagStore for FsStore {
    async fn create_container(&self, bag: &str) -> Result<()> {
        let dir = self.bag_dir(bag);
        blocking(move || {
            fs::create_dir_all(&dir).map_err(|e| {
                MbError::Store(format!(
                    "failed to create data bag '{}': {}",
                    dir.display(),
                    e
                ))
            })
        })
        .await
    }

    async fn container_exists(&self, bag: &str) -> Result<bool> {
        let dir = self.bag_dir(bag);
        blocking(move || Ok(dir.is_dir())).await
    }

    async fn find_item(&self, bag: &str, id: &str) -> Result<Option<Value>> {
        let path = self.item_path(bag, id);
        blocking(move || read_item(&path)).await
    }

    async fn save_item(&self, bag: &str, item: Value) -> Result<bool> {
        let id = item_id(&item)?;
        if id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(MbError::Store(format!("invalid data bag item id '{}'", id)));
        }
        let dir = self.bag_dir(bag);
        let path = self.item_path(bag, &id);
        let bag = bag.to_string();

        blocking(move || {
            if !dir.is_dir() {
                return Err(MbError::Store(format!("data bag '{}' does not exist", bag)));
            }
            let json = serde_json::to_string_pretty(&item)
                .map_err(|e| MbError::Store(format!("failed to serialize item: {}", e)))?;
            atomic_write(&path, json.as_bytes())?;
            Ok(true)
        })
        .await
    }

    async fn delete_item(&self, bag: &str, id: &str) -> Result<bool> {
        let path = self.item_path(bag, id);
        blocking(move || match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MbError::Store(format!(
                "failed to delete item '{}': {}",
                path.display(),
                e
            ))),
        })
        .await
    }

    async fn list_items(&self, bag: &str) -> Result<Vec<Value>> {
        let dir = self.bag_dir(bag);
        blocking(move || {
            if !dir.is_dir() {
                return Ok(Vec::new());
            }

            let entries = fs::read_dir(&dir).map_err(|e| {
                MbError::Store(format!(
                    "failed to read data bag '{}': {}",
                    dir.display(),
                    e
                ))
            })?;

            let mut paths: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
                .collect();
            paths.sort();

            let mut items = Vec::with_capacity(paths.len());
            for path in paths {
                if let Some(item) = read_item(&path)? {
                    items.push(item);
                }
            }
            Ok(items)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_bag_reads_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::new(temp_dir.path());

        assert!(!store.container_exists("locks").await.unwrap());
        assert_eq!(store.find_item("locks", "environment-prod").await.unwrap(), None);
        assert!(store.list_items("locks").await.unwrap().is_empty());
        assert!(!store.delete_item("locks", "environment-prod").await.unwrap());
    }

    #[tokio::test]
    async fn save_requires_existing_bag() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::new(temp_dir.path());

        let err = store
            .save_item("locks", json!({"id": "environment-prod"}))
            .await
            .unwrap_err();
        assert!(matches!(err, MbError::Store(_)));
    }

    #[tokio::test]
    async fn save_overwrites_and_delete_removes() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::new(temp_dir.path());
        store.create_container("locks").await.unwrap();

        store
            .save_item("locks", json!({"id": "environment-prod", "client_name": "a"}))
            .await
            .unwrap();
        store
            .save_item("locks", json!({"id": "environment-prod", "client_name": "b"}))
            .await
            .unwrap();

        let item = store.find_item("locks", "environment-prod").await.unwrap().unwrap();
        assert_eq!(item["client_name"], "b");
        assert!(temp_dir.path().join("locks/environment-prod.json").exists());

        assert!(store.delete_item("locks", "environment-prod").await.unwrap());
        assert_eq!(store.find_item("locks", "environment-prod").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_items_sorted_and_skips_other_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::new(temp_dir.path());
        store.create_container("locks").await.unwrap();

        store.save_item("locks", json!({"id": "environment-b"})).await.unwrap();
        store.save_item("locks", json!({"id": "environment-a"})).await.unwrap();
        std::fs::write(temp_dir.path().join("locks/README"), "notes").unwrap();

        let items = store.list_items("locks").await.unwrap();
        let ids: Vec<_> = items.iter().map(|i| i["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["environment-a", "environment-b"]);
    }

    #[tokio::test]
    async fn malformed_item_is_store_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::new(temp_dir.path());
        store.create_container("locks").await.unwrap();
        std::fs::write(temp_dir.path().join("locks/environment-x.json"), "{not json").unwrap();

        let err = store.find_item("locks", "environment-x").await.unwrap_err();
        assert!(matches!(err, MbError::Store(_)));
    }
}
