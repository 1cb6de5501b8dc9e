//! The execution engine collaborator.
//!
//! Artifact handlers describe *how* to produce their output as a [`Builder`]:
//! a working directory, environment, named input paths and an ordered list of
//! shell commands. The [`Engine`] owns scratch space and runs builders; the
//! orchestration core only passes builders between a handler's `builder` and
//! `build_*` methods and never looks inside them.

mod cmd;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::util::hash::{ContentHash, Hashable, hash_bytes, hash_path};

pub use cmd::execute_cmd;

/// Errors raised by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("command failed with exit code {code:?}: {cmd}\n{stderr}")]
  CmdFailed {
    cmd: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("failed to serialize builder definition: {0}")]
  Definition(#[from] serde_json::Error),

  #[error("builder '{builder}' has no input named '{name}'")]
  MissingInput { builder: String, name: String },

  #[error("engine task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

/// An opaque, serializable description of an execution environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Builder {
  pub name: String,
  pub workdir: Option<PathBuf>,
  pub env: BTreeMap<String, String>,
  /// Paths the commands read, exported to them as environment variables.
  pub inputs: BTreeMap<String, PathBuf>,
  /// Machine-local cache directories, exported like `env` but never part of
  /// the content key.
  pub caches: BTreeMap<String, PathBuf>,
  pub commands: Vec<String>,
}

impl Hashable for Builder {}

impl Builder {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Self::default()
    }
  }

  pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
    self.workdir = Some(workdir.into());
    self
  }

  pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  pub fn with_input(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
    self.inputs.insert(name.into(), path.into());
    self
  }

  pub fn with_cache(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
    self.caches.insert(name.into(), path.into());
    self
  }

  pub fn with_command(mut self, command: impl Into<String>) -> Self {
    self.commands.push(command.into());
    self
  }

  pub fn input(&self, name: &str) -> Result<&Path, EngineError> {
    self
      .inputs
      .get(name)
      .map(PathBuf::as_path)
      .ok_or_else(|| EngineError::MissingInput {
        builder: self.name.clone(),
        name: name.to_string(),
      })
  }

  /// Key identifying this builder's execution graph by content.
  ///
  /// Covers name, environment and commands plus the SHA-256 of the working
  /// directory and of every input. Paths and cache locations are left out so
  /// the key is stable across machines.
  pub async fn content_key(&self) -> Result<ContentHash, EngineError> {
    let inputs = self.inputs.clone();
    let workdir = self.workdir.clone();
    let (workdir_hash, input_hashes) = tokio::task::spawn_blocking(move || -> std::io::Result<_> {
      let workdir_hash = workdir.as_deref().map(hash_path).transpose()?.map(|hash| hash.0);
      let input_hashes = inputs
        .iter()
        .map(|(name, path)| Ok((name.clone(), hash_path(path)?.0)))
        .collect::<std::io::Result<BTreeMap<String, String>>>()?;
      Ok((workdir_hash, input_hashes))
    })
    .await??;

    #[derive(Serialize)]
    struct Key<'a> {
      name: &'a str,
      env: &'a BTreeMap<String, String>,
      commands: &'a [String],
      workdir: Option<String>,
      inputs: BTreeMap<String, String>,
    }

    let serialized = serde_json::to_vec(&Key {
      name: &self.name,
      env: &self.env,
      commands: &self.commands,
      workdir: workdir_hash,
      inputs: input_hashes,
    })?;
    Ok(hash_bytes(&serialized))
  }
}

/// Runs builders in isolated scratch directories under `root`.
#[derive(Debug, Clone)]
pub struct Engine {
  root: PathBuf,
  shell: Option<String>,
}

impl Engine {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      shell: None,
    }
  }

  /// Override the shell used to run commands.
  pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
    self.shell = Some(shell.into());
    self
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// A fresh, empty output directory reserved for `builder`.
  pub async fn output_dir(&self, builder: &Builder) -> Result<PathBuf, EngineError> {
    let hash = builder.compute_hash()?;
    let dir = self.root.join("out").join(format!("{}-{}", builder.name, hash));
    if tokio::fs::try_exists(&dir).await? {
      tokio::fs::remove_dir_all(&dir).await?;
    }
    tokio::fs::create_dir_all(&dir).await?;
    Ok(dir)
  }

  /// Run every command of `builder` in order and return its output directory.
  ///
  /// Commands see the builder's environment, each input and cache under its
  /// own name, and `out` pointing at the output directory.
  pub async fn run(&self, builder: &Builder) -> Result<PathBuf, EngineError> {
    let out_dir = self.output_dir(builder).await?;
    info!(builder = %builder.name, commands = builder.commands.len(), "running builder");

    let mut env = builder.env.clone();
    for (name, path) in builder.inputs.iter().chain(&builder.caches) {
      env.insert(name.clone(), path.to_string_lossy().to_string());
    }
    env.insert("out".to_string(), out_dir.to_string_lossy().to_string());

    let cwd = builder.workdir.as_deref().unwrap_or(&out_dir);
    for (idx, command) in builder.commands.iter().enumerate() {
      debug!(builder = %builder.name, step = idx, "executing command");
      execute_cmd(command, &env, cwd, self.shell.as_deref()).await?;
    }

    Ok(out_dir)
  }

  /// Run a single command, returning its trimmed stdout.
  pub async fn exec(&self, command: &str, env: &BTreeMap<String, String>, cwd: &Path) -> Result<String, EngineError> {
    execute_cmd(command, env, cwd, self.shell.as_deref()).await
  }
}
