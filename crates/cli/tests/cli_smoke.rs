//! CLI smoke tests for shipyard.
//!
//! These tests verify that commands run without panicking and return
//! appropriate exit codes.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn shipyard_cmd() -> Command {
  cargo_bin_cmd!("shipyard")
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  shipyard_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  shipyard_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("shipyard"));
}

#[test]
fn artifacts_help_lists_argument_flags() {
  shipyard_cmd()
    .args(["artifacts", "--help"])
    .assert()
    .success()
    .stdout(predicate::str::contains("--release-version"))
    .stdout(predicate::str::contains("--backend-command"))
    .stdout(predicate::str::contains("--checksum"));
}

// =============================================================================
// List
// =============================================================================

#[test]
fn list_shows_types_and_arguments() {
  shipyard_cmd()
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("targz"))
    .stdout(predicate::str::contains("--build-id"));
}

#[test]
fn list_json_is_valid() {
  let output = shipyard_cmd().args(["list", "--output", "json"]).output().unwrap();
  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["artifacts"].as_array().unwrap().len(), 7);
}

// =============================================================================
// Descriptor errors
// =============================================================================

#[test]
fn artifacts_requires_a_descriptor() {
  shipyard_cmd().arg("artifacts").assert().failure();
}

#[test]
fn unknown_artifact_type_fails() {
  let temp = TempDir::new().unwrap();
  shipyard_cmd()
    .args(["artifacts", "-a", "linux/amd64:grafana:msi", "--store"])
    .arg(temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("no artifact type found"));
}

#[test]
fn colliding_artifact_types_fail() {
  let temp = TempDir::new().unwrap();
  shipyard_cmd()
    .args(["artifacts", "-a", "linux/amd64:targz:deb", "--store"])
    .arg(temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("more than one artifact type"));
}

#[test]
fn conflicting_flags_fail() {
  let temp = TempDir::new().unwrap();
  shipyard_cmd()
    .args(["artifacts", "-a", "enterprise:boring:targz", "--store"])
    .arg(temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("already set"));
}
