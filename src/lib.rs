//! mb: environment locks, supervised jobs and host bootstrap against a shared
//! configuration server.
//!
//! - [`locks`]: distributed mutexes backed by lock items in a data bag store
//! - [`job`]: long-running operations with a status record and termination
//! - [`bootstrap`]: full and partial bootstrap of hosts into an environment
//! - [`context`]: the per-process services every command shares

pub mod bootstrap;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod job;
pub mod locks;
pub mod template;

#[cfg(test)]
mod test_support;
