//! `shipyard artifacts` end to end.

#![cfg(unix)]

use predicates::prelude::*;
use sha2::{Digest, Sha256};

use crate::common::TestEnv;

#[test]
fn builds_exports_and_verifies_targz() {
  let env = TestEnv::new("2.0.0");
  env
    .artifacts_cmd()
    .args(["-a", "linux/amd64:targz", "--checksum", "--verify"])
    .assert()
    .success()
    .stdout(predicate::str::contains("grafana_2.0.0_42_linux-amd64.tar.gz"));

  let archive = env.path("dist/grafana_2.0.0_42_linux-amd64.tar.gz");
  let sidecar = env.path("dist/grafana_2.0.0_42_linux-amd64.tar.gz.sha256");
  let digest = hex::encode(Sha256::digest(std::fs::read(&archive).unwrap()));
  assert_eq!(std::fs::read_to_string(sidecar).unwrap(), digest);
}

#[test]
fn release_version_flag_overrides_package_json() {
  let env = TestEnv::new("2.0.0");
  env
    .artifacts_cmd()
    .args(["-a", "linux/arm/7:zip", "--release-version", "v9.9.9"])
    .assert()
    .success();
  assert!(env.path("dist/grafana_9.9.9_42_linux-arm-7.zip").is_file());
}

#[test]
fn repeated_runs_export_identical_archives() {
  let env = TestEnv::new("2.0.0");
  let archive = env.path("dist/grafana_2.0.0_42_linux-arm64.zip");

  env.artifacts_cmd().args(["-a", "linux/arm64:zip"]).assert().success();
  let first = std::fs::read(&archive).unwrap();

  env.artifacts_cmd().args(["-a", "linux/arm64:zip"]).assert().success();
  assert_eq!(first, std::fs::read(&archive).unwrap());
}

#[test]
fn shared_backend_builds_once_per_run() {
  let env = TestEnv::new("2.0.0");
  env
    .artifacts_cmd()
    .args(["-a", "targz,zip,backend"])
    .assert()
    .success();
  assert_eq!(env.backend_builds(), 1);
}

#[test]
fn json_summary_lists_each_requested_artifact_once() {
  let env = TestEnv::new("3.1.0");
  let output = env
    .artifacts_cmd()
    .args(["-a", "targz,frontend", "-a", "linux/amd64:targz", "--output", "json"])
    .output()
    .unwrap();
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let artifacts = summary["artifacts"].as_array().unwrap();
  assert_eq!(artifacts.len(), 2);
  assert_eq!(artifacts[0]["filename"], "grafana_3.1.0_42_linux-amd64.tar.gz");
  assert_eq!(artifacts[1]["artifact_type"], "directory");
  assert!(env.path("dist/public/grafana_3.1.0_42/build/index.html").is_file());
}

#[test]
fn remote_cache_is_reused_across_stores() {
  let env = TestEnv::new("2.0.0");
  let cache = env.path("remote");

  env
    .artifacts_cmd()
    .args(["-a", "backend", "--remote-cache"])
    .arg(&cache)
    .assert()
    .success();
  assert_eq!(env.backend_builds(), 1);

  env
    .artifacts_cmd()
    .env("SHIPYARD_STORE", env.path("store2"))
    .args(["-a", "backend", "--remote-cache"])
    .arg(&cache)
    .assert()
    .success();
  assert_eq!(env.backend_builds(), 1);
  assert!(env.path("dist/bin/grafana_2.0.0_42_linux-amd64/grafana").is_file());
}

#[test]
fn failing_recipe_exits_non_zero() {
  let env = TestEnv::new("2.0.0");
  env
    .artifacts_cmd_with("echo boom >&2; exit 7")
    .args(["-a", "linux/amd64:targz"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("failed to build"));
}
