//! Arguments shared by the built-in targets.
//!
//! Each declaration is a lazily constructed `Arc<Argument>`, so artifacts can
//! hold the same declaration and the CLI can register its flags.

use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use crate::argument::{Argument, ArgumentFlag, ArgumentType, ArgumentValue, CacheVolume, FlagValue, State, ValueFunc};
use crate::platform::paths::volumes_dir;

/// The project checkout being packaged.
pub static SOURCE_DIR: LazyLock<Arc<Argument>> = LazyLock::new(|| {
  Arc::new(Argument {
    name: "source",
    description: "Path to the project source tree",
    argument_type: ArgumentType::Directory,
    value_func: Some(Arc::new(
      FlagValue::new("source", ArgumentType::Directory).with_default("."),
    )),
    flags: vec![ArgumentFlag {
      name: "source",
      usage: "Path to the project source tree",
      default: Some("."),
    }],
    requires: vec![],
  })
});

/// Release version embedded in every filename.
pub static VERSION: LazyLock<Arc<Argument>> = LazyLock::new(|| {
  Arc::new(Argument {
    name: "version",
    description: "Version of the release, read from package.json unless set",
    argument_type: ArgumentType::String,
    value_func: Some(Arc::new(VersionValue)),
    flags: vec![ArgumentFlag {
      name: "release-version",
      usage: "Override the version taken from package.json",
      default: None,
    }],
    requires: vec![SOURCE_DIR.clone()],
  })
});

/// Identifier of this build, embedded in every filename.
pub static BUILD_ID: LazyLock<Arc<Argument>> = LazyLock::new(|| {
  Arc::new(Argument {
    name: "build-id",
    description: "Identifier of this build (defaults to the current unix time)",
    argument_type: ArgumentType::String,
    value_func: Some(Arc::new(BuildIdValue)),
    flags: vec![ArgumentFlag {
      name: "build-id",
      usage: "Build identifier embedded in artifact filenames",
      default: None,
    }],
    requires: vec![],
  })
});

pub static BACKEND_COMMAND: LazyLock<Arc<Argument>> = LazyLock::new(|| {
  command_argument(
    "backend-command",
    "Shell command compiling the backend into $out",
    "make build-go",
  )
});

pub static FRONTEND_COMMAND: LazyLock<Arc<Argument>> = LazyLock::new(|| {
  command_argument(
    "frontend-command",
    "Shell command building the frontend bundle into $out",
    "yarn build",
  )
});

/// Persistent cache shared by backend and frontend builds.
pub static BUILD_CACHE: LazyLock<Arc<Argument>> = LazyLock::new(|| {
  Arc::new(Argument {
    name: "build-cache",
    description: "Cache volume for compiler and package manager caches",
    argument_type: ArgumentType::CacheVolume,
    value_func: Some(Arc::new(BuildCacheValue)),
    flags: vec![ArgumentFlag {
      name: "cache-dir",
      usage: "Directory for the build cache volume",
      default: None,
    }],
    requires: vec![],
  })
});

/// Every argument the built-in targets use, for CLI registration.
pub fn all() -> Vec<Arc<Argument>> {
  vec![
    SOURCE_DIR.clone(),
    VERSION.clone(),
    BUILD_ID.clone(),
    BACKEND_COMMAND.clone(),
    FRONTEND_COMMAND.clone(),
    BUILD_CACHE.clone(),
  ]
}

fn command_argument(name: &'static str, usage: &'static str, default: &'static str) -> Arc<Argument> {
  Arc::new(Argument {
    name,
    description: usage,
    argument_type: ArgumentType::String,
    value_func: Some(Arc::new(FlagValue::new(name, ArgumentType::String).with_default(default))),
    flags: vec![ArgumentFlag {
      name,
      usage,
      default: Some(default),
    }],
    requires: vec![],
  })
}

struct VersionValue;

#[derive(Deserialize)]
struct PackageJson {
  version: String,
}

#[async_trait]
impl ValueFunc for VersionValue {
  async fn value(&self, state: &State) -> anyhow::Result<ArgumentValue> {
    if let Some(version) = state.cli().get("release-version") {
      return Ok(ArgumentValue::String(version.trim_start_matches('v').to_string()));
    }

    let source = state.directory(&SOURCE_DIR).await?;
    let version = read_package_version(&source.join("package.json")).await?;
    Ok(ArgumentValue::String(version))
  }
}

async fn read_package_version(path: &Path) -> anyhow::Result<String> {
  let contents = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("reading {}", path.display()))?;
  let package: PackageJson =
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
  Ok(package.version)
}

struct BuildIdValue;

#[async_trait]
impl ValueFunc for BuildIdValue {
  async fn value(&self, state: &State) -> anyhow::Result<ArgumentValue> {
    if let Some(id) = state.cli().get("build-id") {
      return Ok(ArgumentValue::String(id.to_string()));
    }
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
    Ok(ArgumentValue::String(now.as_secs().to_string()))
  }
}

struct BuildCacheValue;

#[async_trait]
impl ValueFunc for BuildCacheValue {
  async fn value(&self, state: &State) -> anyhow::Result<ArgumentValue> {
    if let Some(dir) = state.cli().get("cache-dir") {
      return ArgumentValue::parse(ArgumentType::CacheVolume, "cache-dir", dir);
    }
    let volume = CacheVolume::open("build-cache", volumes_dir().join("build-cache"))
      .context("creating build cache volume")?;
    Ok(ArgumentValue::CacheVolume(volume))
  }
}
