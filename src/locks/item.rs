//! Lock items as persisted in the remote data bag.

use super::types::{LockIdentity, LockType};
use crate::error::{MbError, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_]+").expect("Invalid slug regex"));

/// Derive a data bag item id from an arbitrary string.
///
/// Lower-cases, collapses every run of characters outside ASCII
/// `[a-zA-Z0-9_]` into a single `-`, and strips leading and trailing dashes.
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    NON_WORD
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Data bag item id for the lock on `lock_type:name`.
pub fn lock_item_id(lock_type: LockType, name: &str) -> String {
    slugify(&format!("{}:{}", lock_type, name))
}

/// A lock item stored in the locks data bag.
///
/// Absence of the item means the resource is unlocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockItem {
    /// Slug of `type:name`.
    pub id: String,

    /// Kind of resource locked.
    #[serde(rename = "type")]
    pub lock_type: LockType,

    /// Name of the locked resource.
    pub name: String,

    /// Client name of the holder.
    pub client_name: String,

    /// Process id of the holder.
    pub process_id: u32,

    /// When the lock was written.
    pub time: DateTime<Utc>,
}

impl LockItem {
    /// Create a new lock item for `identity` with the current timestamp.
    pub fn new(lock_type: LockType, name: &str, identity: &LockIdentity) -> Self {
        Self {
            id: lock_item_id(lock_type, name),
            lock_type,
            name: name.to_string(),
            client_name: identity.client_name.clone(),
            process_id: identity.process_id,
            time: Utc::now(),
        }
    }

    /// Parse a lock item from the raw data bag JSON.
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| MbError::Store(format!("malformed lock item: {}", e)))
    }

    /// Serialize the lock item to data bag JSON.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| MbError::Store(format!("failed to serialize lock item: {}", e)))
    }

    /// Calculate the age of the lock.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.time)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let age = self.age();
        let minutes = age.num_minutes();
        let hours = age.num_hours();
        let days = age.num_days();

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else {
            format!("{}m", minutes)
        }
    }

    /// Check if the lock is stale based on the given threshold in minutes.
    pub fn is_stale(&self, stale_minutes: u32) -> bool {
        self.age().num_minutes() > i64::from(stale_minutes)
    }
}

/// Owner string used when no client name is configured (`user@HOST`).
pub fn default_client_name() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
