//! Compiled backend binaries for one distribution.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::{Distribution, Release, product_flags};
use crate::argument::CacheVolume;
use crate::arguments::{BACKEND_COMMAND, BUILD_CACHE, SOURCE_DIR};
use crate::artifact::{Artifact, ArtifactError, ArtifactHandler, ArtifactInitializer, ArtifactType, BuildOpts, InitContext};
use crate::engine::{Builder, Engine};
use crate::flag::{Flag, parse_flags};

pub struct BackendHandler {
  pub release: Release,
  pub distro: Distribution,
  source: PathBuf,
  command: String,
  cache: CacheVolume,
}

#[async_trait]
impl ArtifactHandler for BackendHandler {
  fn filename(&self) -> Result<String, ArtifactError> {
    Ok(format!("bin/{}_{}", self.release.stem(), self.distro.slug()))
  }

  async fn dependencies(&self) -> Result<Vec<Arc<Artifact>>, ArtifactError> {
    Ok(vec![])
  }

  async fn builder(&self, _opts: &BuildOpts<'_>) -> Result<Builder, ArtifactError> {
    let product = &self.release.product;
    let mut builder = Builder::new(format!("backend-{}", self.distro.slug()))
      .with_workdir(&self.source)
      .with_env("GOOS", self.distro.os.as_str())
      .with_env("GOARCH", &self.distro.arch)
      .with_cache("GOCACHE", self.cache.path.join("go-build"))
      .with_env("VERSION", &self.release.version)
      .with_env("BUILD_ID", &self.release.build_id)
      .with_env("PACKAGE_NAME", &product.package_name)
      .with_env("ENTERPRISE", if product.enterprise { "1" } else { "0" })
      .with_command(&self.command);

    if let Some(goarm) = self.distro.goarm() {
      builder = builder.with_env("GOARM", goarm);
    }
    if !product.go_experiments.is_empty() {
      builder = builder.with_env("GOEXPERIMENT", product.go_experiments.join(","));
    }
    Ok(builder)
  }

  async fn build_dir(&self, builder: &Builder, opts: &BuildOpts<'_>) -> Result<PathBuf, ArtifactError> {
    Ok(opts.engine.run(builder).await?)
  }

  async fn verify_directory(&self, _engine: &Engine, dir: &Path) -> Result<(), ArtifactError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    if entries.next_entry().await?.is_none() {
      return Err(ArtifactError::Verification(format!(
        "backend output {} is empty",
        dir.display()
      )));
    }
    Ok(())
  }
}

pub struct BackendInitializer;

#[async_trait]
impl ArtifactInitializer for BackendInitializer {
  fn name(&self) -> &'static str {
    "backend"
  }

  fn artifact_type(&self) -> ArtifactType {
    ArtifactType::Directory
  }

  fn flags(&self) -> Vec<Flag> {
    product_flags()
  }

  async fn initialize(&self, descriptor: &str, ctx: &InitContext) -> Result<Arc<Artifact>, ArtifactError> {
    let flags = self.flags();
    let options = parse_flags(descriptor, &flags)?;
    let handler = BackendHandler {
      release: Release::resolve(&options, &ctx.state).await?,
      distro: Distribution::from_descriptor(descriptor)?,
      source: ctx.state.directory(&SOURCE_DIR).await?,
      command: ctx.state.string(&BACKEND_COMMAND).await?,
      cache: ctx.state.cache_volume(&BUILD_CACHE).await?,
    };
    Ok(ctx.artifact(descriptor, self.artifact_type(), flags, handler))
  }
}
