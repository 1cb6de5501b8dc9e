//! Container images saved as `docker save` tarballs.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::{
  ArchiveFormat, ArchiveInitializer, BASE_IMAGE, Distribution, Release, alpine, optional, product_flags, replace_type,
  ubuntu,
};
use crate::artifact::{Artifact, ArtifactError, ArtifactHandler, ArtifactInitializer, ArtifactType, BuildOpts, InitContext};
use crate::engine::{Builder, Engine};
use crate::flag::{Flag, parse_flags};

const DEFAULT_BASE: &str = "alpine";

fn base_image_ref(base: &str) -> &'static str {
  match base {
    "ubuntu" => "ubuntu:24.04",
    _ => "alpine:3.20",
  }
}

const DOCKERFILE: &str = r#"ARG BASE_IMAGE
FROM ${BASE_IMAGE}
COPY app /usr/share/app
WORKDIR /usr/share/app
EXPOSE 3000
ENTRYPOINT ["/usr/share/app/bin/grafana", "server"]
"#;

pub struct DockerHandler {
  pub release: Release,
  pub distro: Distribution,
  pub base: String,
  tarball: Arc<Artifact>,
}

impl DockerHandler {
  fn tag(&self) -> String {
    let suffix = if self.base == DEFAULT_BASE {
      String::new()
    } else {
      format!("-{}", self.base)
    };
    format!(
      "{}:{}-{}{}",
      self.release.product.package_name,
      self.release.version,
      self.distro.slug(),
      suffix
    )
  }
}

#[async_trait]
impl ArtifactHandler for DockerHandler {
  fn filename(&self) -> Result<String, ArtifactError> {
    Ok(format!(
      "{}_{}_{}.docker.tar.gz",
      self.release.stem(),
      self.distro.slug(),
      self.base
    ))
  }

  async fn dependencies(&self) -> Result<Vec<Arc<Artifact>>, ArtifactError> {
    Ok(vec![self.tarball.clone()])
  }

  async fn builder(&self, opts: &BuildOpts<'_>) -> Result<Builder, ArtifactError> {
    let tarball = opts.store.file(&self.tarball).await?;
    Ok(
      Builder::new(format!("docker-{}-{}", self.distro.slug(), self.base))
        .with_input("TARBALL", tarball)
        .with_env("DOCKERFILE", DOCKERFILE)
        .with_env("BASE_IMAGE", base_image_ref(&self.base))
        .with_env("PLATFORM", self.distro.to_string())
        .with_env("TAG", self.tag())
        .with_env("IMAGE_FILE", self.filename()?)
        .with_command("mkdir -p \"$out/context/app\"")
        .with_command("tar -xzf \"$TARBALL\" -C \"$out/context/app\" --strip-components=1")
        .with_command("printf '%s' \"$DOCKERFILE\" > \"$out/context/Dockerfile\"")
        .with_command(
          "docker build --platform \"$PLATFORM\" --build-arg BASE_IMAGE=\"$BASE_IMAGE\" -t \"$TAG\" \"$out/context\"",
        )
        .with_command("docker save \"$TAG\" | gzip -n > \"$out/$IMAGE_FILE\""),
    )
  }

  async fn build_file(&self, builder: &Builder, opts: &BuildOpts<'_>) -> Result<PathBuf, ArtifactError> {
    let out = opts.engine.run(builder).await?;
    Ok(out.join(self.filename()?))
  }

  /// A saved image must carry the `manifest.json` that `docker load` reads.
  async fn verify_file(&self, _engine: &Engine, file: &Path) -> Result<(), ArtifactError> {
    let path = file.to_path_buf();
    let found = tokio::task::spawn_blocking(move || -> io::Result<bool> {
      let decoder = flate2::read::GzDecoder::new(BufReader::new(File::open(&path)?));
      let mut archive = tar::Archive::new(decoder);
      for entry in archive.entries()? {
        if &*entry?.path()? == Path::new("manifest.json") {
          return Ok(true);
        }
      }
      Ok(false)
    })
    .await??;

    if !found {
      return Err(ArtifactError::Verification(format!(
        "{} has no manifest.json",
        file.display()
      )));
    }
    Ok(())
  }
}

pub struct DockerInitializer;

#[async_trait]
impl ArtifactInitializer for DockerInitializer {
  fn name(&self) -> &'static str {
    "docker"
  }

  fn artifact_type(&self) -> ArtifactType {
    ArtifactType::File
  }

  fn flags(&self) -> Vec<Flag> {
    let mut flags = product_flags();
    flags.extend([alpine(), ubuntu()]);
    flags
  }

  async fn initialize(&self, descriptor: &str, ctx: &InitContext) -> Result<Arc<Artifact>, ArtifactError> {
    let flags = self.flags();
    let options = parse_flags(descriptor, &flags)?;
    let tarball = ArchiveInitializer(ArchiveFormat::TarGz)
      .initialize(&replace_type(descriptor, self.name(), "targz"), ctx)
      .await?;

    let handler = DockerHandler {
      release: Release::resolve(&options, &ctx.state).await?,
      distro: Distribution::from_descriptor(descriptor)?,
      base: optional(options.string(BASE_IMAGE))?.unwrap_or_else(|| DEFAULT_BASE.to_string()),
      tarball,
    };
    Ok(ctx.artifact(descriptor, self.artifact_type(), flags, handler))
  }
}
