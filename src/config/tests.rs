//! Tests for config functionality.

use crate::config::types::DEFAULT_LOCKS_DATA_BAG;
use crate::config::Config;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert!(!config.chef.client_name.is_empty());
    assert_eq!(config.ssh.user, "root");
    assert!(config.ssh.sudo);
    assert_eq!(config.ssh.timeout_seconds, 600);
    assert_eq!(config.locks.data_bag, DEFAULT_LOCKS_DATA_BAG);
    assert_eq!(config.locks.stale_minutes, 120);
    assert_eq!(config.jobs.termination_grace_seconds, 10);
    assert_eq!(config.log.level, "info");
    assert!(config.bootstrap.full_command.contains("{host}"));
}

#[test]
fn test_parse_minimal_yaml() {
    let config = Config::from_yaml("").unwrap();

    assert_eq!(config.locks.data_bag, DEFAULT_LOCKS_DATA_BAG);
    assert_eq!(config.ssh.user, "root");
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
chef:
  client_name: reset
ssh:
  user: deploy
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.chef.client_name, "reset");
    assert_eq!(config.ssh.user, "deploy");

    // Unspecified values within a section use defaults
    assert_eq!(config.ssh.timeout_seconds, 600);
    assert_eq!(config.locks.stale_minutes, 120);
}

#[test]
fn test_parse_full_yaml() {
    let yaml = r#"
chef:
  client_name: ops
  server_url: https://chef.example.com
  validator_path: /etc/chef/validation.pem
ssh:
  user: deploy
  keys: [/home/ops/.ssh/id_ed25519]
  sudo: false
  timeout_seconds: 30
locks:
  data_bag: locks
  store_path: /mnt/shared/bags
  stale_minutes: 15
jobs:
  termination_grace_seconds: 2
bootstrap:
  full_command: "bootstrap {host}"
  registered_as_command: "lookup {host}"
  put_secret_command: "copy {host}"
  chef_run_command: "converge {host}"
  merge_data_command: "merge {node_name} {attributes}"
log:
  level: debug
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.chef.client_name, "ops");
    assert_eq!(config.chef.server_url, "https://chef.example.com");
    assert_eq!(
        config.chef.validator_path,
        PathBuf::from("/etc/chef/validation.pem")
    );
    assert_eq!(config.ssh.keys, vec![PathBuf::from("/home/ops/.ssh/id_ed25519")]);
    assert!(!config.ssh.sudo);
    assert_eq!(config.ssh.timeout_seconds, 30);
    assert_eq!(config.locks.data_bag, "locks");
    assert_eq!(config.locks.store_path, PathBuf::from("/mnt/shared/bags"));
    assert_eq!(config.locks.stale_minutes, 15);
    assert_eq!(config.jobs.termination_grace_seconds, 2);
    assert_eq!(config.bootstrap.chef_run_command, "converge {host}");
    assert_eq!(config.log.level, "debug");
}

#[test]
fn test_unknown_fields_ignored() {
    let yaml = r#"
plugin_paths: [/opt/plugins]
chef:
  client_name: ops
  api_key: ignored
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.chef.client_name, "ops");
}

#[test]
fn test_validate_zero_stale_minutes() {
    let result = Config::from_yaml("locks:\n  stale_minutes: 0\n");

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("stale_minutes"));
}

#[test]
fn test_validate_zero_timeout() {
    let result = Config::from_yaml("ssh:\n  timeout_seconds: 0\n");

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("timeout_seconds"));
}

#[test]
fn test_validate_empty_data_bag() {
    let result = Config::from_yaml("locks:\n  data_bag: \"  \"\n");

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("data_bag"));
}

#[test]
fn test_invalid_yaml_is_config_error() {
    let result = Config::from_yaml("chef: [unterminated");
    assert!(matches!(result, Err(crate::error::MbError::Config(_))));
}

#[test]
fn test_yaml_roundtrip_keeps_values() {
    let mut config = Config::default();
    config.chef.client_name = "roundtrip".to_string();
    config.locks.stale_minutes = 42;

    let yaml = config.to_yaml().unwrap();
    let parsed = Config::from_yaml(&yaml).unwrap();

    assert_eq!(parsed.chef.client_name, "roundtrip");
    assert_eq!(parsed.locks.stale_minutes, 42);
}

#[test]
fn test_load_or_default_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::load_or_default(temp_dir.path().join("missing.yaml")).unwrap();
    assert_eq!(config.locks.data_bag, DEFAULT_LOCKS_DATA_BAG);
}

#[test]
fn test_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    std::fs::write(&path, "ssh:\n  user: ubuntu\n").unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.ssh.user, "ubuntu");
}
