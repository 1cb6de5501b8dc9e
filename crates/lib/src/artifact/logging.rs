//! Logging decorator for artifact handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Artifact, ArtifactError, ArtifactHandler, BuildOpts};
use crate::engine::{Builder, Engine};

/// Forwards every call to `inner`, logging each one with the descriptor.
pub struct LoggingHandler {
  descriptor: String,
  inner: Box<dyn ArtifactHandler>,
}

impl LoggingHandler {
  pub fn new(descriptor: impl Into<String>, inner: Box<dyn ArtifactHandler>) -> Self {
    Self {
      descriptor: descriptor.into(),
      inner,
    }
  }
}

#[async_trait]
impl ArtifactHandler for LoggingHandler {
  fn filename(&self) -> Result<String, ArtifactError> {
    self.inner.filename()
  }

  async fn dependencies(&self) -> Result<Vec<Arc<Artifact>>, ArtifactError> {
    debug!(descriptor = %self.descriptor, "resolving dependencies");
    let deps = self.inner.dependencies().await?;
    debug!(descriptor = %self.descriptor, count = deps.len(), "resolved dependencies");
    Ok(deps)
  }

  async fn builder(&self, opts: &BuildOpts<'_>) -> Result<Builder, ArtifactError> {
    debug!(descriptor = %self.descriptor, "preparing builder");
    self.inner.builder(opts).await
  }

  async fn build_file(&self, builder: &Builder, opts: &BuildOpts<'_>) -> Result<PathBuf, ArtifactError> {
    info!(descriptor = %self.descriptor, "building file");
    let start = Instant::now();
    let result = self.inner.build_file(builder, opts).await;
    match &result {
      Ok(path) => info!(
        descriptor = %self.descriptor,
        path = %path.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "built file"
      ),
      Err(e) => warn!(descriptor = %self.descriptor, error = %e, "file build failed"),
    }
    result
  }

  async fn build_dir(&self, builder: &Builder, opts: &BuildOpts<'_>) -> Result<PathBuf, ArtifactError> {
    info!(descriptor = %self.descriptor, "building directory");
    let start = Instant::now();
    let result = self.inner.build_dir(builder, opts).await;
    match &result {
      Ok(path) => info!(
        descriptor = %self.descriptor,
        path = %path.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "built directory"
      ),
      Err(e) => warn!(descriptor = %self.descriptor, error = %e, "directory build failed"),
    }
    result
  }

  async fn verify_file(&self, engine: &Engine, file: &Path) -> Result<(), ArtifactError> {
    info!(descriptor = %self.descriptor, file = %file.display(), "verifying file");
    let result = self.inner.verify_file(engine, file).await;
    if let Err(e) = &result {
      warn!(descriptor = %self.descriptor, error = %e, "verification failed");
    }
    result
  }

  async fn verify_directory(&self, engine: &Engine, dir: &Path) -> Result<(), ArtifactError> {
    info!(descriptor = %self.descriptor, dir = %dir.display(), "verifying directory");
    let result = self.inner.verify_directory(engine, dir).await;
    if let Err(e) = &result {
      warn!(descriptor = %self.descriptor, error = %e, "verification failed");
    }
    result
  }
}
