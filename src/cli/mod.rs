//! CLI argument parsing for mb.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// mb: coordinate environment locks and bootstrap nodes against a shared
/// configuration server.
///
/// Every operator client locks an environment through a lock item in a shared
/// data bag store before changing it:
/// - `lock` / `unlock` manage a lock by hand
/// - `locks` shows who holds what, and since when
/// - `bootstrap` provisions hosts while holding the environment lock
#[derive(Parser, Debug)]
#[command(name = "mb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file (default: ~/.mb/config.yaml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless MB_LOG says otherwise.
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for mb.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lock an environment.
    ///
    /// Fails if another client holds the lock, unless --force is given.
    Lock(LockArgs),

    /// Unlock an environment.
    ///
    /// Only a lock taken by this client and process is removed, unless
    /// --force is given.
    Unlock(LockArgs),

    /// List lock items with their holders and age.
    Locks,

    /// Bootstrap hosts into an environment.
    ///
    /// Takes the environment lock, then runs a full bootstrap on hosts the
    /// server does not know and a partial one on registered hosts. Prints
    /// one line per host.
    Bootstrap(BootstrapArgs),

    /// Print version information.
    Version,
}

#[derive(Parser, Debug)]
pub struct LockArgs {
    /// Environment name.
    pub environment: String,

    /// Ignore who currently holds the lock.
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct BootstrapArgs {
    /// Environment the hosts join.
    pub environment: String,

    /// Hosts to bootstrap.
    #[arg(required = true)]
    pub hosts: Vec<String>,

    /// JSON object merged into each registered node's attributes.
    #[arg(long)]
    pub attributes: Option<String>,

    /// Take the environment lock even if someone else holds it.
    #[arg(long)]
    pub force: bool,

    /// Leave the environment locked if the bootstrap fails.
    #[arg(long)]
    pub keep_lock_on_failure: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
