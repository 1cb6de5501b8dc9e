//! The built-in artifact types.
//!
//! | Name | Type | Depends on |
//! |---|---|---|
//! | `backend` | directory | |
//! | `frontend` | directory | |
//! | `targz`, `zip` | file | `backend`, `frontend` |
//! | `deb`, `rpm` | file | `targz` |
//! | `docker` | file | `targz` |
//!
//! Dependencies are constructed by rewriting the artifact-type token of the
//! requested descriptor, so `linux/arm64:enterprise:deb` depends on
//! `linux/arm64:enterprise:targz`.

pub mod archive;
pub mod backend;
pub mod distro;
pub mod docker;
pub mod frontend;
pub mod package;

use crate::argument::State;
use crate::arguments::{BUILD_ID, VERSION};
use crate::artifact::{ArtifactError, Initializers};
use crate::flag::{Flag, FlagError, OptionKey, OptionsHandler};

pub use archive::{ArchiveFormat, ArchiveInitializer};
pub use backend::BackendInitializer;
pub use distro::{Distribution, Os};
pub use docker::DockerInitializer;
pub use frontend::FrontendInitializer;
pub use package::{PackageFormat, PackageInitializer};

pub const ENTERPRISE: OptionKey = OptionKey("enterprise");
pub const PACKAGE_NAME: OptionKey = OptionKey("package-name");
pub const GO_EXPERIMENTS: OptionKey = OptionKey("go-experiments");
pub const BASE_IMAGE: OptionKey = OptionKey("base-image");

const DEFAULT_PACKAGE_NAME: &str = "grafana";

pub fn grafana() -> Flag {
  Flag::new("grafana").with(ENTERPRISE, false).with(PACKAGE_NAME, "grafana")
}

pub fn enterprise() -> Flag {
  Flag::new("enterprise")
    .with(ENTERPRISE, true)
    .with(PACKAGE_NAME, "grafana-enterprise")
}

pub fn pro() -> Flag {
  Flag::new("pro").with(ENTERPRISE, true).with(PACKAGE_NAME, "grafana-pro")
}

/// Enterprise built against BoringCrypto.
pub fn boring() -> Flag {
  Flag::new("boring")
    .with(ENTERPRISE, true)
    .with(PACKAGE_NAME, "grafana-enterprise-boringcrypto")
    .with(GO_EXPERIMENTS, vec!["boringcrypto"])
}

pub fn alpine() -> Flag {
  Flag::new("alpine").with(BASE_IMAGE, "alpine")
}

pub fn ubuntu() -> Flag {
  Flag::new("ubuntu").with(BASE_IMAGE, "ubuntu")
}

/// Flags every target understands.
pub fn product_flags() -> Vec<Flag> {
  vec![grafana(), enterprise(), pro(), boring()]
}

/// Registry of every built-in artifact type.
pub fn initializers() -> Initializers {
  Initializers::new()
    .with(BackendInitializer)
    .with(FrontendInitializer)
    .with(ArchiveInitializer(ArchiveFormat::TarGz))
    .with(ArchiveInitializer(ArchiveFormat::Zip))
    .with(PackageInitializer(PackageFormat::Deb))
    .with(PackageInitializer(PackageFormat::Rpm))
    .with(DockerInitializer)
}

/// Product options selected by a descriptor's flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
  pub package_name: String,
  pub enterprise: bool,
  pub go_experiments: Vec<String>,
}

impl Product {
  pub fn from_options(options: &OptionsHandler) -> Result<Self, FlagError> {
    Ok(Self {
      package_name: optional(options.string(PACKAGE_NAME))?.unwrap_or_else(|| DEFAULT_PACKAGE_NAME.to_string()),
      enterprise: options.bool(ENTERPRISE)?,
      go_experiments: optional(options.string_slice(GO_EXPERIMENTS))?.unwrap_or_default(),
    })
  }
}

/// Treat a missing option as `None`, keeping type errors.
pub(crate) fn optional<T>(result: Result<T, FlagError>) -> Result<Option<T>, FlagError> {
  match result {
    Ok(value) => Ok(Some(value)),
    Err(FlagError::FlagOptionNotFound { .. }) => Ok(None),
    Err(e) => Err(e),
  }
}

/// Everything that distinguishes one release of a product from another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
  pub product: Product,
  pub version: String,
  pub build_id: String,
}

impl Release {
  pub async fn resolve(options: &OptionsHandler, state: &State) -> Result<Self, ArtifactError> {
    Ok(Self {
      product: Product::from_options(options)?,
      version: state.string(&VERSION).await?,
      build_id: state.string(&BUILD_ID).await?,
    })
  }

  /// `{package}_{version}_{build_id}`, the stem shared by every filename.
  pub fn stem(&self) -> String {
    format!("{}_{}_{}", self.product.package_name, self.version, self.build_id)
  }

  /// Top-level directory inside archives.
  pub fn root_dir(&self) -> String {
    format!("{}-{}", self.product.package_name, self.version)
  }
}

/// Replace the artifact-type token `from` in `descriptor` with `to`.
pub fn replace_type(descriptor: &str, from: &str, to: &str) -> String {
  descriptor
    .split(':')
    .map(|token| if token == from { to } else { token })
    .collect::<Vec<_>>()
    .join(":")
}
