//! Locking subsystem for mb.
//!
//! Operators coordinate exclusive access to remote resources (environments)
//! through lock items in a shared data bag store. There is no other channel
//! between clients, so the store is the only authority on who holds a lock.
//!
//! # Lock Items
//!
//! Each held lock is one JSON item in the locks data bag
//! (`_motherbrain_locks_` by default):
//! - `id`: slug of `type:name` (e.g. `environment-my-app`)
//! - `type`, `name`: the locked resource
//! - `client_name`, `process_id`: the holder
//! - `time`: RFC3339 timestamp of acquisition
//!
//! # Known Race
//!
//! Acquisition is read-then-write. Two clients can both see no item and both
//! write one; each then believes it holds the lock. Stores offering atomic
//! create-if-absent avoid this (see [`MemoryStore::create_if_absent`]).
//!
//! # Registry
//!
//! Every [`LockContext`] owns a [`LockRegistry`] of mutexes this process
//! believes it holds. Shutdown releases them so abandoned locks do not strand
//! the resource for other operators.

mod fs_store;
mod item;
mod mutex;
mod operations;
mod registry;
mod store;
mod types;


// Re-export public API
pub use fs_store::FsStore;
pub use item::{LockItem, default_client_name, lock_item_id, slugify};
pub use mutex::{ChefMutex, LockContext, MB_ENV_VAR, MutexBuilder, externally_testing};
pub use operations::list_locks;
pub use registry::LockRegistry;
pub use store::{DataBagStore, MemoryStore};
pub use types::{LockIdentity, LockInfo, LockType, Ownership};
