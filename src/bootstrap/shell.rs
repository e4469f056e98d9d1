//! Command-template connector.
//!
//! Implements the remote collaborators by running the commands configured
//! under `bootstrap:` (knife, ssh, scp by default). Each template is split
//! into argv and then rendered, and the program is executed directly without
//! a shell.

use super::remote::{ChefConnection, NodeQuerier};
use super::types::{BootstrapOptions, HostResponse};
use crate::config::{BootstrapConfig, ChefConfig, Config, SshConfig};
use crate::error::{MbError, Result};
use crate::template::{Vars, render_command};
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Runs configured command templates against hosts.
#[derive(Debug, Clone)]
pub struct ShellConnector {
    chef: ChefConfig,
    ssh: SshConfig,
    commands: BootstrapConfig,
}

impl ShellConnector {
    pub fn new(config: &Config) -> Self {
        Self {
            chef: config.chef.clone(),
            ssh: config.ssh.clone(),
            commands: config.bootstrap.clone(),
        }
    }

    fn vars(&self, host: &str) -> Vars<'static> {
        let mut vars = Vars::new();
        vars.insert("host", host.to_string());
        vars.insert("user", self.ssh.user.clone());
        vars.insert(
            "sudo",
            if self.ssh.sudo { "sudo" } else { "env" }.to_string(),
        );
        vars.insert(
            "validator_path",
            self.chef.validator_path.display().to_string(),
        );
        vars
    }

    /// Pass the configured keys to `ssh` and `scp`.
    fn with_identity_files(&self, mut argv: Vec<String>) -> Vec<String> {
        if matches!(argv[0].as_str(), "ssh" | "scp") {
            let identity_args = self
                .ssh
                .keys
                .iter()
                .flat_map(|key| ["-i".to_string(), key.display().to_string()]);
            argv.splice(1..1, identity_args);
        }
        argv
    }

    /// Render `template` and run it, capturing its output.
    ///
    /// The process is killed when it outlives the ssh timeout.
    async fn run(&self, host: &str, template: &str, vars: &Vars<'_>) -> Result<HostResponse> {
        let argv = self.with_identity_files(render_command(template, vars)?);
        debug!(host, command = %shell_words::join(&argv), "running remote command");

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            MbError::RemoteCommand(format!(
                "failed to execute '{}': {}\n\
                 Fix: ensure the command is installed and in PATH.",
                argv[0], e
            ))
        })?;

        let timeout = Duration::from_secs(self.ssh.timeout_seconds);
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                MbError::RemoteCommand(format!(
                    "'{}' on {} timed out after {}s",
                    argv[0], host, self.ssh.timeout_seconds
                ))
            })?
            .map_err(|e| {
                MbError::RemoteCommand(format!("failed to wait for '{}': {}", argv[0], e))
            })?;

        Ok(HostResponse {
            host: host.to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Describe a failed command by its stderr, or its exit code if it was silent.
fn failure_message(response: &HostResponse, what: &str) -> String {
    let stderr = response.stderr.trim();
    if stderr.is_empty() {
        format!(
            "{} on {} exited with code {}",
            what, response.host, response.exit_code
        )
    } else {
        stderr.to_string()
    }
}

#[async_trait]
impl NodeQuerier for ShellConnector {
    async fn registered_as(&self, host: &str) -> Result<Option<String>> {
        let vars = self.vars(host);
        let response = self
            .run(host, &self.commands.registered_as_command, &vars)
            .await?;
        if !response.is_success() {
            return Err(MbError::RemoteCommand(failure_message(
                &response,
                "registration query",
            )));
        }

        let name = response.stdout.lines().map(str::trim).find(|l| !l.is_empty());
        Ok(name.map(str::to_string))
    }

    async fn put_secret(&self, host: &str) -> Result<()> {
        let vars = self.vars(host);
        let response = self
            .run(host, &self.commands.put_secret_command, &vars)
            .await
            .map_err(|e| MbError::RemoteFileCopy(e.to_string()))?;
        if !response.is_success() {
            return Err(MbError::RemoteFileCopy(failure_message(
                &response,
                "secret copy",
            )));
        }
        Ok(())
    }

    async fn chef_run(&self, host: &str) -> Result<()> {
        let vars = self.vars(host);
        let response = self.run(host, &self.commands.chef_run_command, &vars).await?;
        if !response.is_success() {
            return Err(MbError::RemoteCommand(failure_message(
                &response,
                "configuration run",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ChefConnection for ShellConnector {
    async fn bootstrap(&self, host: &str, options: &BootstrapOptions) -> Result<HostResponse> {
        if !self.chef.validator_path.is_file() {
            return Err(MbError::ValidatorNotFound(
                self.chef.validator_path.display().to_string(),
            ));
        }

        let mut vars = self.vars(host);
        vars.insert("environment", options.environment.clone());
        vars.insert("attributes", options.attributes.to_string());
        self.run(host, &self.commands.full_command, &vars).await
    }

    async fn merge_data(&self, node_name: &str, attributes: &Value) -> Result<()> {
        let mut vars = self.vars(node_name);
        vars.insert("node_name", node_name.to_string());
        vars.insert("attributes", attributes.to_string());

        let response = self
            .run(node_name, &self.commands.merge_data_command, &vars)
            .await?;
        if !response.is_success() {
            return Err(MbError::RemoteCommand(failure_message(
                &response,
                "attribute merge",
            )));
        }
        Ok(())
    }
}
