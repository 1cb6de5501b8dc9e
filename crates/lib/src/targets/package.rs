//! Linux packages built from the release tarball with `fpm`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::{ArchiveFormat, ArchiveInitializer, Distribution, Release, product_flags, replace_type};
use crate::artifact::{Artifact, ArtifactError, ArtifactHandler, ArtifactInitializer, ArtifactType, BuildOpts, InitContext};
use crate::engine::{Builder, Engine};
use crate::flag::{Flag, parse_flags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFormat {
  Deb,
  Rpm,
}

impl PackageFormat {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Deb => "deb",
      Self::Rpm => "rpm",
    }
  }

  fn inspect_command(&self) -> &'static str {
    match self {
      Self::Deb => "dpkg-deb --info \"$PACKAGE\"",
      Self::Rpm => "rpm -qip \"$PACKAGE\"",
    }
  }
}

pub struct PackageHandler {
  pub format: PackageFormat,
  pub release: Release,
  pub distro: Distribution,
  tarball: Arc<Artifact>,
}

impl PackageHandler {
  fn arch(&self) -> &str {
    match self.format {
      PackageFormat::Deb => self.distro.deb_arch(),
      PackageFormat::Rpm => self.distro.rpm_arch(),
    }
  }
}

#[async_trait]
impl ArtifactHandler for PackageHandler {
  fn filename(&self) -> Result<String, ArtifactError> {
    let name = &self.release.product.package_name;
    let version = &self.release.version;
    let build_id = &self.release.build_id;
    Ok(match self.format {
      PackageFormat::Deb => format!("{name}_{version}_{build_id}_{}.deb", self.arch()),
      PackageFormat::Rpm => format!("{name}-{version}-{build_id}.{}.rpm", self.arch()),
    })
  }

  async fn dependencies(&self) -> Result<Vec<Arc<Artifact>>, ArtifactError> {
    Ok(vec![self.tarball.clone()])
  }

  async fn builder(&self, opts: &BuildOpts<'_>) -> Result<Builder, ArtifactError> {
    let tarball = opts.store.file(&self.tarball).await?;
    let package_name = &self.release.product.package_name;
    Ok(
      Builder::new(format!("{}-{}", self.format.name(), self.distro.slug()))
        .with_input("TARBALL", tarball)
        .with_env("PACKAGE_NAME", package_name)
        .with_env("PACKAGE_FILE", self.filename()?)
        .with_env("VERSION", &self.release.version)
        .with_env("ITERATION", &self.release.build_id)
        .with_env("ARCH", self.arch())
        .with_command("mkdir -p \"$out/root/usr/share/$PACKAGE_NAME\"")
        .with_command("tar -xzf \"$TARBALL\" -C \"$out/root/usr/share/$PACKAGE_NAME\" --strip-components=1")
        .with_command(format!(
          "fpm -s dir -t {} -n \"$PACKAGE_NAME\" -v \"$VERSION\" --iteration \"$ITERATION\" -a \"$ARCH\" -p \"$out/$PACKAGE_FILE\" -C \"$out/root\" .",
          self.format.name()
        )),
    )
  }

  async fn build_file(&self, builder: &Builder, opts: &BuildOpts<'_>) -> Result<PathBuf, ArtifactError> {
    let out = opts.engine.run(builder).await?;
    Ok(out.join(self.filename()?))
  }

  async fn verify_file(&self, engine: &Engine, file: &Path) -> Result<(), ArtifactError> {
    let env = BTreeMap::from([("PACKAGE".to_string(), file.to_string_lossy().to_string())]);
    let cwd = file.parent().unwrap_or(engine.root());
    let info = engine.exec(self.format.inspect_command(), &env, cwd).await?;
    if !info.contains(self.release.product.package_name.as_str()) {
      return Err(ArtifactError::Verification(format!(
        "{} does not describe package {}",
        file.display(),
        self.release.product.package_name
      )));
    }
    Ok(())
  }
}

pub struct PackageInitializer(pub PackageFormat);

#[async_trait]
impl ArtifactInitializer for PackageInitializer {
  fn name(&self) -> &'static str {
    self.0.name()
  }

  fn artifact_type(&self) -> ArtifactType {
    ArtifactType::File
  }

  fn flags(&self) -> Vec<Flag> {
    product_flags()
  }

  async fn initialize(&self, descriptor: &str, ctx: &InitContext) -> Result<Arc<Artifact>, ArtifactError> {
    let flags = self.flags();
    let options = parse_flags(descriptor, &flags)?;
    let tarball = ArchiveInitializer(ArchiveFormat::TarGz)
      .initialize(&replace_type(descriptor, self.name(), "targz"), ctx)
      .await?;

    let handler = PackageHandler {
      format: self.0,
      release: Release::resolve(&options, &ctx.state).await?,
      distro: Distribution::from_descriptor(descriptor)?,
      tarball,
    };
    Ok(ctx.artifact(descriptor, self.artifact_type(), flags, handler))
  }
}
