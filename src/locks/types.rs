//! Lock type definitions and information structures.

use super::item::LockItem;
use crate::error::{MbError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of remote resource a mutex guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockType {
    /// A configuration-server environment.
    Environment,
}

impl LockType {
    /// Every lock type a mutex may be built with.
    pub const ALL: &'static [LockType] = &[LockType::Environment];

    /// The name stored in lock items and used in the item id.
    pub fn as_str(&self) -> &'static str {
        match self {
            LockType::Environment => "environment",
        }
    }
}

impl fmt::Display for LockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockType {
    type Err = MbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "environment" | "chef_environment" => Ok(LockType::Environment),
            _ => Err(MbError::InvalidLockType(valid_lock_types())),
        }
    }
}

/// Comma separated list of valid lock type names, for error messages.
pub(crate) fn valid_lock_types() -> String {
    LockType::ALL
        .iter()
        .map(LockType::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Who the process running a mutex is, as recorded in lock items.
///
/// A lock item belongs to this process only when both fields match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockIdentity {
    /// Configuration-server client name of the operator.
    pub client_name: String,

    /// Process id of the lock holder.
    pub process_id: u32,
}

impl LockIdentity {
    /// Identity of the current process for the given client name.
    pub fn current(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            process_id: std::process::id(),
        }
    }
}

/// Relationship between a stored lock item and this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// No lock item exists.
    Absent,
    /// The item was written by this client and process.
    Ours,
    /// The item was written by someone else.
    Theirs,
}

/// Information about a lock item found in the store.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// The stored item.
    pub item: LockItem,

    /// Whether the lock is older than the stale threshold.
    pub is_stale: bool,
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (owner: {}, pid: {}, age: {}{})",
            self.item.id,
            self.item.client_name,
            self.item.process_id,
            self.item.age_string(),
            if self.is_stale { ", STALE" } else { "" }
        )
    }
}
