//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated project, store and output directories.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// A project at `version` whose build recipes are plain shell commands.
  pub fn new(version: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(
      source.join("package.json"),
      format!(r#"{{"name":"grafana","version":"{version}"}}"#),
    )
    .unwrap();
    Self { temp }
  }

  pub fn path(&self, rel: &str) -> PathBuf {
    self.temp.path().join(rel)
  }

  /// Backend recipe that also appends a line to `backend.log` per build.
  pub fn backend_command(&self) -> String {
    format!(
      "printf 'server' > \"$out/grafana\" && chmod +x \"$out/grafana\" && echo built >> '{}'",
      self.path("backend.log").display()
    )
  }

  /// Number of times the backend recipe ran.
  pub fn backend_builds(&self) -> usize {
    std::fs::read_to_string(self.path("backend.log"))
      .map(|log| log.lines().count())
      .unwrap_or(0)
  }

  /// `shipyard artifacts` preconfigured with this project's paths.
  pub fn artifacts_cmd(&self) -> Command {
    self.artifacts_cmd_with(&self.backend_command())
  }

  pub fn artifacts_cmd_with(&self, backend_command: &str) -> Command {
    let mut cmd = cargo_bin_cmd!("shipyard");
    cmd
      .env("SHIPYARD_STORE", self.path("store"))
      .env("SHIPYARD_CACHE", self.path("cache"))
      .env_remove("RUST_LOG")
      .arg("artifacts")
      .arg("--source")
      .arg(self.path("src"))
      .arg("--destination")
      .arg(self.path("dist"))
      .args(["--build-id", "42"])
      .args(["--backend-command", backend_command])
      .args([
        "--frontend-command",
        "mkdir -p \"$out/build\" && printf '<html/>' > \"$out/build/index.html\"",
      ]);
    cmd
  }
}
