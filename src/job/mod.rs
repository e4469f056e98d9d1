//! Supervised asynchronous jobs.
//!
//! A [`Job`] is one unit of asynchronous work with an observable status and a
//! terminal outcome. Every job runs as its own actor task holding its record;
//! status changes are pushed to the [`JobManager`], which keeps one
//! [`JobRecord`] per job for the life of the process and tracks which jobs are
//! still active.
//!
//! # Supervision
//!
//! A job leaves the active set when:
//! - its body finishes (success or failure),
//! - its worker task panics or is aborted,
//! - every handle to it is dropped while it is still running.
//!
//! In the last two cases the record is forced into `failure` with an
//! `incomplete:` error rather than being left `running`.

mod job;
mod manager;
mod record;

#[cfg(test)]
mod tests;

pub use job::{Job, WeakJob};
pub use manager::{JobManager, SpawnedJob};
pub use record::{JobId, JobRecord, JobState};
