//! Fleet bootstrap.
//!
//! Given a list of hosts, decide per host whether it needs a full bootstrap
//! (not registered with the configuration server) or a partial one (secret
//! refresh and configuration run), run every host concurrently, and report
//! exactly one result per host in input order.
//!
//! Remote work goes through the [`NodeQuerier`] and [`ChefConnection`]
//! traits; [`ShellConnector`] implements both with configurable command
//! templates.

mod environment;
mod remote;
mod shell;
mod types;
mod worker;


pub use environment::{LockOptions, bootstrap_environment, results_of};
pub use remote::{ChefConnection, NodeQuerier};
pub use shell::ShellConnector;
pub use types::{
    BootstrapNode, BootstrapOptions, BootstrapType, HostResponse, NodeBootstrapResult, NodeStatus,
};
pub use worker::BootstrapWorker;
