//! Shell command execution.

use std::collections::BTreeMap;
use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use super::EngineError;

/// Number of trailing stderr lines kept in a [`EngineError::CmdFailed`].
const STDERR_TAIL_LINES: usize = 20;

/// Execute a shell command.
///
/// The command inherits the process environment with `env` layered on top,
/// runs in `cwd`, and goes through `sh -c` unless `shell` names another
/// POSIX-compatible shell.
///
/// # Returns
///
/// The stdout of the command on success (trimmed).
pub async fn execute_cmd(
  cmd: &str,
  env: &BTreeMap<String, String>,
  cwd: &Path,
  shell: Option<&str>,
) -> Result<String, EngineError> {
  info!(cmd = %cmd, "executing command");

  let (shell_cmd, shell_args) = get_shell(shell);
  let mut command = Command::new(shell_cmd);
  command
    .args(shell_args)
    .arg(cmd)
    .current_dir(cwd)
    .envs(env)
    // Reproducible timestamps: January 1, 1980 00:00:00 UTC (ZIP epoch)
    .env("SOURCE_DATE_EPOCH", "315532800");

  debug!(shell = %shell_cmd, working_dir = ?cwd, "spawning process");
  let output = command.output().await?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command stdout");
    }

    let lines: Vec<&str> = stderr.lines().collect();
    let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
    return Err(EngineError::CmdFailed {
      cmd: cmd.to_string(),
      code: output.status.code(),
      stderr: tail,
    });
  }

  let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
  if !stdout.is_empty() {
    debug!(stdout = %stdout, "command output");
  }

  Ok(stdout)
}

/// Recipes are POSIX shell; Windows hosts need `sh` on PATH (Git Bash, MSYS2).
#[cfg(unix)]
const DEFAULT_SHELL: &str = "/bin/sh";
#[cfg(windows)]
const DEFAULT_SHELL: &str = "sh";

/// The shell and its arguments, `<shell> -c <cmd>`.
fn get_shell(override_shell: Option<&str>) -> (&str, [&str; 1]) {
  (override_shell.unwrap_or(DEFAULT_SHELL), ["-c"])
}
