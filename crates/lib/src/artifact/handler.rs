//! The artifact capability trait.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::{Artifact, ArtifactError};
use crate::argument::State;
use crate::engine::{Builder, Engine};
use crate::store::ArtifactStore;

/// Everything a handler may use while preparing and running a build.
#[derive(Clone, Copy)]
pub struct BuildOpts<'a> {
  pub state: &'a State,
  /// Holds the outputs of every dependency by the time `builder` runs.
  pub store: &'a dyn ArtifactStore,
  pub engine: &'a Engine,
}

/// The contract every artifact type implements.
///
/// Exactly one of `build_file` / `build_dir` is meaningful for a given
/// artifact, selected by its [`ArtifactType`](super::ArtifactType). The other
/// keeps the default, which reports [`ArtifactError::NotSupported`].
#[async_trait]
pub trait ArtifactHandler: Send + Sync {
  /// Deterministic store key. Must change whenever any input that
  /// distinguishes this artifact changes (distribution, version, build id,
  /// flags); two artifacts sharing a filename share one build.
  fn filename(&self) -> Result<String, ArtifactError>;

  /// Artifacts that must be built and stored before this one.
  async fn dependencies(&self) -> Result<Vec<Arc<Artifact>>, ArtifactError>;

  /// Prepare the execution environment passed to `build_file`/`build_dir`.
  async fn builder(&self, opts: &BuildOpts<'_>) -> Result<Builder, ArtifactError>;

  async fn build_file(&self, _builder: &Builder, _opts: &BuildOpts<'_>) -> Result<PathBuf, ArtifactError> {
    Err(ArtifactError::NotSupported { operation: "build_file" })
  }

  async fn build_dir(&self, _builder: &Builder, _opts: &BuildOpts<'_>) -> Result<PathBuf, ArtifactError> {
    Err(ArtifactError::NotSupported { operation: "build_dir" })
  }

  /// Smoke-test a built file. The default performs no checks.
  async fn verify_file(&self, _engine: &Engine, _file: &Path) -> Result<(), ArtifactError> {
    Ok(())
  }

  /// Smoke-test a built directory. The default performs no checks.
  async fn verify_directory(&self, _engine: &Engine, _dir: &Path) -> Result<(), ArtifactError> {
    Ok(())
  }
}
