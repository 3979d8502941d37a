//! CLI smoke tests for gear.
//!
//! None of these reach the network: commands either only read local state or
//! fail during config validation.

use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

const COMMIT: &str = "9fceb02d0ae598e95dc970b74767f19372d61af8";

fn gear_cmd() -> Command {
  cargo_bin_cmd!("gear")
}

/// Write a config whose deployment directory lives inside `temp`.
fn write_config(temp: &TempDir, extra: &str) -> std::path::PathBuf {
  let deploy_dir = temp.path().join("deploy");
  let config = format!(
    r#"
environment: DEV
sync_interval: 60
repository:
  url: https://example.com/acme/deployments.git
  branch: main
deployment:
  directory: '{}'
{}
"#,
    deploy_dir.display(),
    extra
  );
  let path = temp.path().join("config.yaml");
  std::fs::write(&path, config).unwrap();
  path
}

fn write_state(deploy_dir: &Path) {
  std::fs::create_dir_all(deploy_dir).unwrap();
  std::fs::write(
    deploy_dir.join(".deployment-state.yaml"),
    format!("currentHash: {}\ndeployedServices:\n  - web\n  - worker\n", COMMIT),
  )
  .unwrap();
}

#[test]
fn help_flag_works() {
  gear_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  gear_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("gear"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["run", "check", "status"] {
    gear_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("--config"));
  }
}

#[test]
fn status_without_deployment() {
  let temp = TempDir::new().unwrap();
  let config = write_config(&temp, "");

  gear_cmd()
    .args(["status", "--config"])
    .arg(&config)
    .assert()
    .success()
    .stdout(predicate::str::contains("No deployment recorded"));
}

#[test]
fn status_shows_recorded_deployment() {
  let temp = TempDir::new().unwrap();
  let config = write_config(&temp, "");
  write_state(&temp.path().join("deploy"));

  gear_cmd()
    .args(["status", "--config"])
    .arg(&config)
    .assert()
    .success()
    .stdout(predicate::str::contains("9fceb02d0ae5"))
    .stdout(predicate::str::contains("worker"));
}

#[test]
fn status_json_output() {
  let temp = TempDir::new().unwrap();
  let config = write_config(&temp, "");
  write_state(&temp.path().join("deploy"));

  let output = gear_cmd()
    .args(["status", "--json", "--config"])
    .arg(&config)
    .output()
    .unwrap();

  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["current_hash"], COMMIT);
  assert_eq!(json["deployed_services"], serde_json::json!(["web", "worker"]));
}

#[test]
fn status_honours_custom_state_file() {
  let temp = TempDir::new().unwrap();
  let state_dir = temp.path().join("state");
  write_state(&state_dir);
  let config = write_config(
    &temp,
    &format!(
      "  state_file: '{}'",
      state_dir.join(".deployment-state.yaml").display()
    ),
  );

  gear_cmd()
    .args(["status", "--config"])
    .arg(&config)
    .assert()
    .success()
    .stdout(predicate::str::contains("9fceb02d0ae5"));
}

#[test]
fn run_with_missing_config_fails() {
  let temp = TempDir::new().unwrap();

  gear_cmd()
    .args(["run", "--config"])
    .arg(temp.path().join("nope.yaml"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn check_rejects_zero_interval() {
  let temp = TempDir::new().unwrap();
  let path = temp.path().join("config.yaml");
  std::fs::write(
    &path,
    r#"
sync_interval: 0
repository:
  url: https://example.com/acme/deployments.git
  branch: main
deployment:
  directory: /tmp/gear
"#,
  )
  .unwrap();

  gear_cmd()
    .args(["check", "--config"])
    .arg(&path)
    .assert()
    .failure()
    .stderr(predicate::str::contains("invalid config"));
}

#[test]
fn check_requires_readable_encryption_key() {
  let temp = TempDir::new().unwrap();
  let missing_key = temp.path().join("missing.key");
  let path = temp.path().join("config.yaml");
  std::fs::write(
    &path,
    format!(
      r#"
sync_interval: 30
encryption_key_file: '{}'
repository:
  url: https://example.com/acme/deployments.git
  branch: main
deployment:
  directory: '{}'
"#,
      missing_key.display(),
      temp.path().join("deploy").display()
    ),
  )
  .unwrap();

  gear_cmd()
    .args(["check", "--config"])
    .arg(&path)
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to read encryption key"));
}
