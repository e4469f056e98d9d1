//! Command implementations for mb.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, plus config loading shared by `main`.

mod bootstrap;
mod lock;

pub use bootstrap::cmd_bootstrap;
pub use lock::{cmd_lock, cmd_locks, cmd_unlock};

use crate::cli::Command;
use crate::config::{Config, default_config_path};
use crate::context::AppContext;
use crate::error::Result;
use std::path::Path;

/// Dispatch a command to its implementation.
pub async fn dispatch(ctx: &AppContext, command: Command) -> Result<()> {
    match command {
        Command::Lock(args) => cmd_lock(ctx, args).await,
        Command::Unlock(args) => cmd_unlock(ctx, args).await,
        Command::Locks => cmd_locks(ctx).await,
        Command::Bootstrap(args) => cmd_bootstrap(ctx, args).await,
        Command::Version => {
            cmd_version();
            Ok(())
        }
    }
}

/// Execute `mb version`.
pub fn cmd_version() {
    println!("mb {}", env!("CARGO_PKG_VERSION"));
}

/// Load the config from `path`, or from `~/.mb/config.yaml` when none is given.
///
/// An explicit path must exist; the default path falls back to built-in
/// defaults when missing.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(default_config_path()),
    }
}
