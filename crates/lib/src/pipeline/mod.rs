//! Orchestration: parse descriptors, build dependencies first, then export
//! and verify under a concurrency budget.
//!
//! # Submodules
//!
//! - [`action`] - the full run: parse, build, export/verify
//! - [`locks`] - per-filename locks giving single-flight builds

pub mod action;
pub mod locks;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::argument::State;
use crate::artifact::{Artifact, ArtifactError, ArtifactType, BuildOpts, ParseError};
use crate::engine::Engine;
use crate::store::{ArtifactStore, Payload, StoreError};

pub use action::{ActionOpts, ArtifactSummary, RunSummary, export_and_verify, run};
pub use locks::KeyedLocks;

/// Errors raised while orchestrating a run.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Parse(#[from] ParseError),

  #[error("dependency cycle: {}", chain.join(" -> "))]
  DependencyCycle { chain: Vec<String> },

  #[error("failed to compute filename for '{descriptor}'")]
  Filename {
    descriptor: String,
    #[source]
    source: ArtifactError,
  },

  #[error("failed to build '{descriptor}' ({filename})")]
  Build {
    descriptor: String,
    filename: String,
    #[source]
    source: ArtifactError,
  },

  #[error("store error for '{descriptor}'")]
  Store {
    descriptor: String,
    #[source]
    source: StoreError,
  },

  #[error("failed to export '{descriptor}' ({filename})")]
  Export {
    descriptor: String,
    filename: String,
    #[source]
    source: StoreError,
  },

  #[error("failed to verify '{descriptor}' ({filename})")]
  Verify {
    descriptor: String,
    filename: String,
    #[source]
    source: ArtifactError,
  },

  #[error("pipeline task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

/// Shared, run-scoped collaborators for building artifacts.
#[derive(Clone)]
pub struct BuildContext {
  pub state: Arc<State>,
  pub store: Arc<dyn ArtifactStore>,
  pub engine: Arc<Engine>,
  locks: Arc<KeyedLocks>,
}

impl BuildContext {
  pub fn new(state: Arc<State>, store: Arc<dyn ArtifactStore>, engine: Arc<Engine>) -> Self {
    Self {
      state,
      store,
      engine,
      locks: Arc::new(KeyedLocks::new()),
    }
  }

  pub fn opts(&self) -> BuildOpts<'_> {
    BuildOpts {
      state: &self.state,
      store: self.store.as_ref(),
      engine: &self.engine,
    }
  }
}

/// Build `artifact` and everything it depends on, dependencies first.
///
/// An artifact whose filename is already in the store is skipped, so each
/// filename is built at most once per store. Concurrent callers asking for
/// the same filename wait for the first build instead of repeating it.
pub async fn build_artifact(ctx: &BuildContext, artifact: &Arc<Artifact>) -> Result<(), PipelineError> {
  let mut chain = Vec::new();
  build_recursive(ctx, artifact, &mut chain).await
}

type BuildFuture<'a> = Pin<Box<dyn Future<Output = Result<(), PipelineError>> + Send + 'a>>;

fn build_recursive<'a>(ctx: &'a BuildContext, artifact: &'a Arc<Artifact>, chain: &'a mut Vec<String>) -> BuildFuture<'a> {
  Box::pin(async move {
    let descriptor = artifact.descriptor.clone();
    let filename = artifact.filename().map_err(|source| PipelineError::Filename {
      descriptor: descriptor.clone(),
      source,
    })?;

    // Checked before locking: the lock for a filename on our own path is held.
    if chain.contains(&filename) {
      let mut cycle = chain.clone();
      cycle.push(filename);
      return Err(PipelineError::DependencyCycle { chain: cycle });
    }

    let store_err = |source| PipelineError::Store {
      descriptor: descriptor.clone(),
      source,
    };
    if ctx.store.exists(artifact).await.map_err(store_err)? {
      debug!(descriptor = %descriptor, filename = %filename, "already built");
      return Ok(());
    }

    let _guard = ctx.locks.lock(&filename).await;
    if ctx.store.exists(artifact).await.map_err(store_err)? {
      debug!(descriptor = %descriptor, filename = %filename, "built by a concurrent caller");
      return Ok(());
    }

    let build_err = |source| PipelineError::Build {
      descriptor: descriptor.clone(),
      filename: filename.clone(),
      source,
    };

    let dependencies = artifact.handler.dependencies().await.map_err(build_err)?;
    chain.push(filename.clone());
    for dependency in &dependencies {
      let result = build_recursive(ctx, dependency, chain).await;
      if result.is_err() {
        chain.pop();
        return result;
      }
    }
    chain.pop();

    let opts = ctx.opts();
    let builder = artifact.handler.builder(&opts).await.map_err(build_err)?;
    let path = match artifact.artifact_type {
      ArtifactType::File => artifact.handler.build_file(&builder, &opts).await,
      ArtifactType::Directory => artifact.handler.build_dir(&builder, &opts).await,
    }
    .map_err(build_err)?;

    info!(descriptor = %descriptor, filename = %filename, path = %path.display(), "storing build result");
    ctx
      .store
      .store(artifact, Payload::new(artifact.artifact_type, path))
      .await
      .map_err(store_err)?;
    Ok(())
  })
}
