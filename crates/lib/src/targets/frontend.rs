//! The frontend bundle. Shared by every distribution of a release.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::{Release, product_flags};
use crate::argument::CacheVolume;
use crate::arguments::{BUILD_CACHE, FRONTEND_COMMAND, SOURCE_DIR};
use crate::artifact::{Artifact, ArtifactError, ArtifactHandler, ArtifactInitializer, ArtifactType, BuildOpts, InitContext};
use crate::engine::{Builder, Engine};
use crate::flag::{Flag, parse_flags};

pub struct FrontendHandler {
  pub release: Release,
  source: PathBuf,
  command: String,
  cache: CacheVolume,
}

#[async_trait]
impl ArtifactHandler for FrontendHandler {
  fn filename(&self) -> Result<String, ArtifactError> {
    Ok(format!("public/{}", self.release.stem()))
  }

  async fn dependencies(&self) -> Result<Vec<Arc<Artifact>>, ArtifactError> {
    Ok(vec![])
  }

  async fn builder(&self, _opts: &BuildOpts<'_>) -> Result<Builder, ArtifactError> {
    let product = &self.release.product;
    Ok(
      Builder::new("frontend")
        .with_workdir(&self.source)
        .with_env("VERSION", &self.release.version)
        .with_env("BUILD_ID", &self.release.build_id)
        .with_env("PACKAGE_NAME", &product.package_name)
        .with_env("ENTERPRISE", if product.enterprise { "1" } else { "0" })
        .with_env("NODE_ENV", "production")
        .with_cache("YARN_CACHE_FOLDER", self.cache.path.join("yarn"))
        .with_command(&self.command),
    )
  }

  async fn build_dir(&self, builder: &Builder, opts: &BuildOpts<'_>) -> Result<PathBuf, ArtifactError> {
    Ok(opts.engine.run(builder).await?)
  }

  async fn verify_directory(&self, _engine: &Engine, dir: &Path) -> Result<(), ArtifactError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    if entries.next_entry().await?.is_none() {
      return Err(ArtifactError::Verification(format!(
        "frontend bundle {} is empty",
        dir.display()
      )));
    }
    Ok(())
  }
}

pub struct FrontendInitializer;

#[async_trait]
impl ArtifactInitializer for FrontendInitializer {
  fn name(&self) -> &'static str {
    "frontend"
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
    let handler = FrontendHandler {
      release: Release::resolve(&options, &ctx.state).await?,
      source: ctx.state.directory(&SOURCE_DIR).await?,
      command: ctx.state.string(&FRONTEND_COMMAND).await?,
      cache: ctx.state.cache_volume(&BUILD_CACHE).await?,
    };
    Ok(ctx.artifact(descriptor, self.artifact_type(), flags, handler))
  }
}
