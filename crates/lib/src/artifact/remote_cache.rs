//! Remote cache decorator.
//!
//! Before running a real build, [`RemoteCacheHandler`] computes the builder's
//! content key and asks a [`RemoteCache`] for a pre-built payload. On a miss it
//! builds through the inner handler and publishes the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Artifact, ArtifactError, ArtifactHandler, ArtifactType, BuildOpts};
use crate::engine::{Builder, Engine};
use crate::util::fs::copy_path;
use crate::util::hash::ContentHash;

/// Marker written last when publishing, so partial entries are never served.
const COMPLETE_MARKER: &str = ".complete";

/// Name of the payload inside a cache entry.
const PAYLOAD: &str = "payload";

/// A store of pre-built payloads keyed by builder content.
#[async_trait]
pub trait RemoteCache: Send + Sync {
  /// Copy the payload for `key` to `dest`. Returns `false` on a miss.
  async fn fetch(&self, key: &ContentHash, dest: &Path) -> Result<bool, ArtifactError>;

  /// Publish the payload at `path` under `key`.
  async fn publish(&self, key: &ContentHash, path: &Path) -> Result<(), ArtifactError>;
}

/// A [`RemoteCache`] backed by a shared directory (network mount, CI cache).
///
/// Layout: `<root>/<key>/payload` plus a `.complete` marker.
#[derive(Debug, Clone)]
pub struct DirectoryCache {
  root: PathBuf,
}

impl DirectoryCache {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  fn entry(&self, key: &ContentHash) -> PathBuf {
    self.root.join(&key.0)
  }
}

#[async_trait]
impl RemoteCache for DirectoryCache {
  async fn fetch(&self, key: &ContentHash, dest: &Path) -> Result<bool, ArtifactError> {
    let entry = self.entry(key);
    if !tokio::fs::try_exists(entry.join(COMPLETE_MARKER)).await? {
      return Ok(false);
    }

    let payload = entry.join(PAYLOAD);
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || copy_path(&payload, &dest)).await??;
    Ok(true)
  }

  async fn publish(&self, key: &ContentHash, path: &Path) -> Result<(), ArtifactError> {
    let entry = self.entry(key);
    if tokio::fs::try_exists(entry.join(COMPLETE_MARKER)).await? {
      return Ok(());
    }

    let root = self.root.clone();
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
      std::fs::create_dir_all(&root)?;
      let staging = tempfile::Builder::new().prefix(".publish-").tempdir_in(&root)?;
      copy_path(&path, &staging.path().join(PAYLOAD))?;
      std::fs::write(staging.path().join(COMPLETE_MARKER), b"")?;

      let staged = staging.keep();
      if let Err(e) = std::fs::rename(&staged, &entry) {
        // Another publisher won the race; its entry is equivalent.
        std::fs::remove_dir_all(&staged)?;
        if !entry.join(COMPLETE_MARKER).exists() {
          return Err(e);
        }
      }
      Ok(())
    })
    .await??;
    Ok(())
  }
}

/// Restores payloads from a [`RemoteCache`] before falling back to `inner`.
pub struct RemoteCacheHandler {
  inner: Box<dyn ArtifactHandler>,
  cache: Arc<dyn RemoteCache>,
}

impl RemoteCacheHandler {
  pub fn new(inner: Box<dyn ArtifactHandler>, cache: Arc<dyn RemoteCache>) -> Self {
    Self { inner, cache }
  }

  async fn cached_build(
    &self,
    artifact_type: ArtifactType,
    builder: &Builder,
    opts: &BuildOpts<'_>,
  ) -> Result<PathBuf, ArtifactError> {
    let key = builder.content_key().await?;
    let filename = self.inner.filename()?;
    let basename = Path::new(&filename)
      .file_name()
      .map(PathBuf::from)
      .unwrap_or_else(|| PathBuf::from(PAYLOAD));
    let dest = opts.engine.root().join("remote").join(&key.0).join(basename);

    if self.cache.fetch(&key, &dest).await? {
      info!(filename = %filename, key = %key, "remote cache hit");
      return Ok(dest);
    }
    debug!(filename = %filename, key = %key, "remote cache miss");

    let path = match artifact_type {
      ArtifactType::File => self.inner.build_file(builder, opts).await?,
      ArtifactType::Directory => self.inner.build_dir(builder, opts).await?,
    };

    if let Err(e) = self.cache.publish(&key, &path).await {
      warn!(filename = %filename, key = %key, error = %e, "failed to publish to remote cache");
    }
    Ok(path)
  }
}

#[async_trait]
impl ArtifactHandler for RemoteCacheHandler {
  fn filename(&self) -> Result<String, ArtifactError> {
    self.inner.filename()
  }

  async fn dependencies(&self) -> Result<Vec<Arc<Artifact>>, ArtifactError> {
    self.inner.dependencies().await
  }

  async fn builder(&self, opts: &BuildOpts<'_>) -> Result<Builder, ArtifactError> {
    self.inner.builder(opts).await
  }

  async fn build_file(&self, builder: &Builder, opts: &BuildOpts<'_>) -> Result<PathBuf, ArtifactError> {
    self.cached_build(ArtifactType::File, builder, opts).await
  }

  async fn build_dir(&self, builder: &Builder, opts: &BuildOpts<'_>) -> Result<PathBuf, ArtifactError> {
    self.cached_build(ArtifactType::Directory, builder, opts).await
  }

  async fn verify_file(&self, engine: &Engine, file: &Path) -> Result<(), ArtifactError> {
    self.inner.verify_file(engine, file).await
  }

  async fn verify_directory(&self, engine: &Engine, dir: &Path) -> Result<(), ArtifactError> {
    self.inner.verify_directory(engine, dir).await
  }
}
