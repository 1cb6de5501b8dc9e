//! The run-scoped result store.
//!
//! Built payloads are recorded under their artifact's filename, the only
//! identity key in the system. A dependent reads its dependencies' payloads
//! back from the store while building.
//!
//! # Submodules
//!
//! - [`export`] - copying payloads out of the store, with `.sha256` sidecars
//! - [`logging`] - decorator logging every store call

pub mod export;
pub mod logging;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::artifact::{Artifact, ArtifactError, ArtifactType};

pub use export::export_payload;
pub use logging::LoggingStore;

/// A built output, referenced by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
  File(PathBuf),
  Directory(PathBuf),
}

impl Payload {
  /// Wrap `path` in the variant matching `artifact_type`.
  pub fn new(artifact_type: ArtifactType, path: PathBuf) -> Self {
    match artifact_type {
      ArtifactType::File => Self::File(path),
      ArtifactType::Directory => Self::Directory(path),
    }
  }

  pub fn path(&self) -> &Path {
    match self {
      Self::File(path) | Self::Directory(path) => path,
    }
  }

  pub fn artifact_type(&self) -> ArtifactType {
    match self {
      Self::File(_) => ArtifactType::File,
      Self::Directory(_) => ArtifactType::Directory,
    }
  }
}

/// Errors raised by the store.
#[derive(Debug, Error)]
pub enum StoreError {
  /// A dependent asked for an artifact that was never stored.
  #[error("artifact '{filename}' not found in store")]
  NotFound { filename: String },

  #[error("artifact '{filename}' is a {actual}, expected a {expected}")]
  UnexpectedPayload {
    filename: String,
    expected: ArtifactType,
    actual: ArtifactType,
  },

  #[error("invalid artifact filename '{filename}'")]
  InvalidFilename { filename: String },

  #[error("failed to compute artifact filename: {0}")]
  Filename(#[source] Box<ArtifactError>),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("store task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

/// Key/value cache of built artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
  async fn exists(&self, artifact: &Artifact) -> Result<bool, StoreError>;

  /// Record the payload for `artifact`. A second store for the same
  /// filename replaces the first.
  async fn store(&self, artifact: &Artifact, payload: Payload) -> Result<(), StoreError>;

  /// Path of a stored file artifact.
  async fn file(&self, artifact: &Artifact) -> Result<PathBuf, StoreError>;

  /// Path of a stored directory artifact.
  async fn directory(&self, artifact: &Artifact) -> Result<PathBuf, StoreError>;

  /// Copy the stored payload to `destination/<filename>`, plus a `.sha256`
  /// sidecar for files when `checksum` is set. Returns every written path.
  async fn export(&self, artifact: &Artifact, destination: &Path, checksum: bool) -> Result<Vec<PathBuf>, StoreError>;
}

pub(crate) fn filename_of(artifact: &Artifact) -> Result<String, StoreError> {
  artifact.filename().map_err(|e| StoreError::Filename(Box::new(e)))
}

/// In-memory [`ArtifactStore`] mapping filenames to payload paths.
#[derive(Debug, Default)]
pub struct MapStore {
  entries: RwLock<HashMap<String, Payload>>,
}

impl MapStore {
  pub fn new() -> Self {
    Self::default()
  }

  async fn get(&self, artifact: &Artifact) -> Result<(String, Payload), StoreError> {
    let filename = filename_of(artifact)?;
    let entries = self.entries.read().await;
    match entries.get(&filename) {
      Some(payload) => Ok((filename, payload.clone())),
      None => Err(StoreError::NotFound { filename }),
    }
  }

  async fn typed(&self, artifact: &Artifact, expected: ArtifactType) -> Result<PathBuf, StoreError> {
    let (filename, payload) = self.get(artifact).await?;
    if payload.artifact_type() != expected {
      return Err(StoreError::UnexpectedPayload {
        filename,
        expected,
        actual: payload.artifact_type(),
      });
    }
    Ok(payload.path().to_path_buf())
  }
}

#[async_trait]
impl ArtifactStore for MapStore {
  async fn exists(&self, artifact: &Artifact) -> Result<bool, StoreError> {
    let filename = filename_of(artifact)?;
    Ok(self.entries.read().await.contains_key(&filename))
  }

  async fn store(&self, artifact: &Artifact, payload: Payload) -> Result<(), StoreError> {
    let filename = filename_of(artifact)?;
    self.entries.write().await.insert(filename, payload);
    Ok(())
  }

  async fn file(&self, artifact: &Artifact) -> Result<PathBuf, StoreError> {
    self.typed(artifact, ArtifactType::File).await
  }

  async fn directory(&self, artifact: &Artifact) -> Result<PathBuf, StoreError> {
    self.typed(artifact, ArtifactType::Directory).await
  }

  async fn export(&self, artifact: &Artifact, destination: &Path, checksum: bool) -> Result<Vec<PathBuf>, StoreError> {
    let (filename, payload) = self.get(artifact).await?;
    export_payload(&payload, destination, &filename, checksum).await
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use std::sync::Arc;

  use async_trait::async_trait;

  use super::*;
  use crate::artifact::{ArtifactHandler, BuildOpts};
  use crate::engine::Builder;

  pub(crate) struct Named(pub &'static str);

  #[async_trait]
  impl ArtifactHandler for Named {
    fn filename(&self) -> Result<String, ArtifactError> {
      Ok(self.0.to_string())
    }

    async fn dependencies(&self) -> Result<Vec<Arc<Artifact>>, ArtifactError> {
      Ok(vec![])
    }

    async fn builder(&self, _opts: &BuildOpts<'_>) -> Result<Builder, ArtifactError> {
      Ok(Builder::new(self.0))
    }
  }

  pub(crate) fn artifact(filename: &'static str, artifact_type: ArtifactType) -> Artifact {
    Artifact {
      descriptor: format!("test:{filename}"),
      artifact_type,
      flags: vec![],
      handler: Box::new(Named(filename)),
    }
  }

  #[tokio::test]
  async fn stores_and_retrieves_by_filename() {
    let store = MapStore::new();
    let tarball = artifact("grafana.tar.gz", ArtifactType::File);
    assert!(!store.exists(&tarball).await.unwrap());

    store
      .store(&tarball, Payload::File(PathBuf::from("/tmp/grafana.tar.gz")))
      .await
      .unwrap();
    assert!(store.exists(&tarball).await.unwrap());
    assert_eq!(store.file(&tarball).await.unwrap(), PathBuf::from("/tmp/grafana.tar.gz"));

    // A different artifact with the same filename shares the entry.
    let alias = artifact("grafana.tar.gz", ArtifactType::File);
    assert!(store.exists(&alias).await.unwrap());
  }

  #[tokio::test]
  async fn missing_entries_are_not_found() {
    let store = MapStore::new();
    let err = store.file(&artifact("absent", ArtifactType::File)).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { ref filename } if filename == "absent"));
  }

  #[tokio::test]
  async fn payload_kind_is_checked() {
    let store = MapStore::new();
    let public = artifact("public", ArtifactType::Directory);
    store
      .store(&public, Payload::Directory(PathBuf::from("/tmp/public")))
      .await
      .unwrap();

    assert!(store.directory(&public).await.is_ok());
    assert!(matches!(
      store.file(&public).await,
      Err(StoreError::UnexpectedPayload {
        expected: ArtifactType::File,
        actual: ArtifactType::Directory,
        ..
      })
    ));
  }
}
