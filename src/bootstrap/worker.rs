//! Fleet bootstrap worker.

use super::remote::{ChefConnection, NodeQuerier};
use super::types::{BootstrapNode, BootstrapOptions, BootstrapType, NodeBootstrapResult};
use crate::error::{MbError, Result};
use crate::job::Job;
use std::sync::Arc;
use tokio_util::task::AbortOnDropHandle;
use tracing::{info, warn};

/// Bootstraps a list of hosts, one result per host.
///
/// Hosts unknown to the configuration server get a full bootstrap; registered
/// hosts get a partial one. Every host runs on its own task, and one host's
/// failure never stops the others.
pub struct BootstrapWorker {
    hosts: Vec<String>,
    options: BootstrapOptions,
    querier: Arc<dyn NodeQuerier>,
    connection: Arc<dyn ChefConnection>,
    job: Option<Job>,
}

impl BootstrapWorker {
    pub fn new(
        hosts: Vec<String>,
        options: BootstrapOptions,
        querier: Arc<dyn NodeQuerier>,
        connection: Arc<dyn ChefConnection>,
    ) -> Self {
        Self {
            hosts,
            options,
            querier,
            connection,
            job: None,
        }
    }

    /// Report progress into `job`.
    pub fn with_job(mut self, job: Job) -> Self {
        self.job = Some(job);
        self
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Look up the registration of every host, in input order.
    pub async fn nodes(&self) -> Result<Vec<BootstrapNode>> {
        self.lookup_all()
            .await
            .into_iter()
            .map(|(hostname, lookup)| {
                lookup.map(|node_name| BootstrapNode {
                    hostname,
                    node_name,
                })
            })
            .collect()
    }

    /// Bootstrap every host and return one result per host, in input order.
    ///
    /// Only a missing validator key fails the whole run; every other failure
    /// is recorded in that host's result. A host whose registration cannot be
    /// determined is reported as a failed full bootstrap.
    pub async fn run(&self) -> Result<Vec<NodeBootstrapResult>> {
        if self.hosts.is_empty() {
            return Ok(Vec::new());
        }

        self.set_status(format!(
            "Querying registration of {} node(s)",
            self.hosts.len()
        ))
        .await;

        let mut results: Vec<Option<NodeBootstrapResult>> = vec![None; self.hosts.len()];
        let mut full = Vec::new();
        let mut partial = Vec::new();

        for (index, (hostname, lookup)) in self.lookup_all().await.into_iter().enumerate() {
            match lookup {
                Ok(None) => full.push((index, hostname)),
                Ok(Some(node_name)) => partial.push((
                    index,
                    BootstrapNode {
                        hostname,
                        node_name: Some(node_name),
                    },
                )),
                Err(e) => {
                    warn!(host = %hostname, error = %e, "registration query failed");
                    results[index] = Some(NodeBootstrapResult::error(
                        hostname,
                        None,
                        BootstrapType::Full,
                        e.to_string(),
                    ));
                }
            }
        }

        info!(
            full = full.len(),
            partial = partial.len(),
            "Bootstrapping nodes"
        );
        self.set_status(format!(
            "Bootstrapping {} new and {} registered node(s)",
            full.len(),
            partial.len()
        ))
        .await;

        let full_hosts: Vec<String> = full.iter().map(|(_, host)| host.clone()).collect();
        let partial_nodes: Vec<BootstrapNode> =
            partial.iter().map(|(_, node)| node.clone()).collect();

        let (full_results, partial_results) = tokio::join!(
            self.full_bootstrap(&full_hosts),
            self.partial_bootstrap(&partial_nodes)
        );

        let slots = full
            .iter()
            .map(|(index, _)| *index)
            .zip(full_results?)
            .chain(partial.iter().map(|(index, _)| *index).zip(partial_results));
        for (index, result) in slots {
            results[index] = Some(result);
        }

        Ok(results.into_iter().flatten().collect())
    }

    /// Install and register every host concurrently.
    ///
    /// Exit code 0 is `ok` with an empty message; anything else is `error`
    /// with the command's stderr as the message. A missing validator key
    /// fails the whole call once every host has finished.
    pub async fn full_bootstrap(&self, hosts: &[String]) -> Result<Vec<NodeBootstrapResult>> {
        let tasks: Vec<(String, HostTask<_>)> = hosts
            .iter()
            .map(|host| {
                let connection = Arc::clone(&self.connection);
                let options = self.options.clone();
                let target = host.clone();
                let task = AbortOnDropHandle::new(tokio::spawn(async move {
                    connection.bootstrap(&target, &options).await
                }));
                (host.clone(), task)
            })
            .collect();

        let mut results = Vec::with_capacity(tasks.len());
        let mut validator_missing = None;

        for (host, task) in tasks {
            let result = match join(&host, task).await {
                Ok(response) if response.is_success() => {
                    NodeBootstrapResult::ok(host, None, BootstrapType::Full)
                }
                Ok(response) => {
                    NodeBootstrapResult::error(host, None, BootstrapType::Full, response.stderr)
                }
                Err(err @ MbError::ValidatorNotFound(_)) => {
                    validator_missing = Some(err);
                    continue;
                }
                Err(err) => {
                    NodeBootstrapResult::error(host, None, BootstrapType::Full, err.to_string())
                }
            };
            results.push(result);
        }

        match validator_missing {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }

    /// Refresh every registered node concurrently.
    ///
    /// Per node, strictly in order: merge the attributes into its record,
    /// place the secret, run the configuration. The first failing step ends
    /// that node with `error` and the failure's text.
    pub async fn partial_bootstrap(&self, nodes: &[BootstrapNode]) -> Vec<NodeBootstrapResult> {
        let tasks: Vec<(BootstrapNode, HostTask<()>)> = nodes
            .iter()
            .map(|node| {
                let querier = Arc::clone(&self.querier);
                let connection = Arc::clone(&self.connection);
                let attributes = self.options.attributes.clone();
                let target = node.clone();
                let task = AbortOnDropHandle::new(tokio::spawn(async move {
                    let node_name = target.node_name.as_deref().unwrap_or(&target.hostname);
                    connection.merge_data(node_name, &attributes).await?;
                    querier.put_secret(&target.hostname).await?;
                    querier.chef_run(&target.hostname).await
                }));
                (node.clone(), task)
            })
            .collect();

        let mut results = Vec::with_capacity(tasks.len());
        for (node, task) in tasks {
            let result = match join(&node.hostname, task).await {
                Ok(()) => {
                    NodeBootstrapResult::ok(node.hostname, node.node_name, BootstrapType::Partial)
                }
                Err(err) => NodeBootstrapResult::error(
                    node.hostname,
                    node.node_name,
                    BootstrapType::Partial,
                    err.to_string(),
                ),
            };
            results.push(result);
        }
        results
    }

    async fn lookup_all(&self) -> Vec<(String, Result<Option<String>>)> {
        let tasks: Vec<_> = self
            .hosts
            .iter()
            .map(|host| {
                let querier = Arc::clone(&self.querier);
                let target = host.clone();
                let task = AbortOnDropHandle::new(tokio::spawn(async move {
                    querier.registered_as(&target).await
                }));
                (host.clone(), task)
            })
            .collect();

        let mut lookups = Vec::with_capacity(tasks.len());
        for (host, task) in tasks {
            let lookup = join(&host, task).await;
            lookups.push((host, lookup));
        }
        lookups
    }

    async fn set_status(&self, status: String) {
        if let Some(job) = &self.job {
            job.set_status(status).await;
        }
    }
}

/// Work for one host. Dropping it aborts the task, so remote commands stop
/// when the run is abandoned.
type HostTask<T> = AbortOnDropHandle<Result<T>>;

/// Await a per-host task, turning a panic into that host's error.
async fn join<T>(host: &str, task: HostTask<T>) -> Result<T> {
    task.await.unwrap_or_else(|e| {
        Err(MbError::RemoteCommand(format!(
            "bootstrap task for {} failed: {}",
            host, e
        )))
    })
}
