//! Logging decorator for artifact stores.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use super::{ArtifactStore, Payload, StoreError};
use crate::artifact::Artifact;

/// Forwards every call to `inner`, logging descriptor and outcome.
pub struct LoggingStore<S> {
  inner: S,
}

impl<S: ArtifactStore> LoggingStore<S> {
  pub fn new(inner: S) -> Self {
    Self { inner }
  }
}

#[async_trait]
impl<S: ArtifactStore> ArtifactStore for LoggingStore<S> {
  async fn exists(&self, artifact: &Artifact) -> Result<bool, StoreError> {
    let exists = self.inner.exists(artifact).await?;
    debug!(descriptor = %artifact.descriptor, exists, "checked store");
    Ok(exists)
  }

  async fn store(&self, artifact: &Artifact, payload: Payload) -> Result<(), StoreError> {
    debug!(descriptor = %artifact.descriptor, path = %payload.path().display(), "storing artifact");
    self.inner.store(artifact, payload).await
  }

  async fn file(&self, artifact: &Artifact) -> Result<PathBuf, StoreError> {
    debug!(descriptor = %artifact.descriptor, "reading file from store");
    self.inner.file(artifact).await
  }

  async fn directory(&self, artifact: &Artifact) -> Result<PathBuf, StoreError> {
    debug!(descriptor = %artifact.descriptor, "reading directory from store");
    self.inner.directory(artifact).await
  }

  async fn export(&self, artifact: &Artifact, destination: &Path, checksum: bool) -> Result<Vec<PathBuf>, StoreError> {
    info!(
      descriptor = %artifact.descriptor,
      destination = %destination.display(),
      checksum,
      "exporting artifact"
    );
    let written = self.inner.export(artifact, destination, checksum).await?;
    for path in &written {
      info!(descriptor = %artifact.descriptor, path = %path.display(), "exported");
    }
    Ok(written)
  }
}
