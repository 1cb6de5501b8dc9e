//! Resolved argument values.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::ArgumentType;

/// A persistent directory shared between runs, identified by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheVolume {
  pub name: String,
  pub path: PathBuf,
}

impl CacheVolume {
  /// Open (creating if needed) the cache volume at `path`.
  pub fn open(name: impl Into<String>, path: impl Into<PathBuf>) -> std::io::Result<Self> {
    let path = path.into();
    std::fs::create_dir_all(&path)?;
    Ok(Self { name: name.into(), path })
  }
}

/// A resolved value, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentValue {
  String(String),
  Int64(i64),
  Bool(bool),
  File(PathBuf),
  Directory(PathBuf),
  CacheVolume(CacheVolume),
}

impl ArgumentValue {
  pub fn kind(&self) -> ArgumentType {
    match self {
      Self::String(_) => ArgumentType::String,
      Self::Int64(_) => ArgumentType::Int64,
      Self::Bool(_) => ArgumentType::Bool,
      Self::File(_) => ArgumentType::File,
      Self::Directory(_) => ArgumentType::Directory,
      Self::CacheVolume(_) => ArgumentType::CacheVolume,
    }
  }

  /// Parse a raw CLI string into a value of the given kind.
  ///
  /// Files and directories must exist; cache volumes are created on demand.
  pub fn parse(kind: ArgumentType, name: &str, raw: &str) -> anyhow::Result<Self> {
    let value = match kind {
      ArgumentType::String => Self::String(raw.to_string()),
      ArgumentType::Int64 => Self::Int64(
        raw
          .trim()
          .parse()
          .with_context(|| format!("--{} expects an integer, got '{}'", name, raw))?,
      ),
      ArgumentType::Bool => Self::Bool(parse_bool(raw).with_context(|| format!("--{} expects a boolean", name))?),
      ArgumentType::File => {
        let path = absolute(Path::new(raw))?;
        anyhow::ensure!(path.is_file(), "--{}: '{}' is not a file", name, path.display());
        Self::File(path)
      }
      ArgumentType::Directory => {
        let path = absolute(Path::new(raw))?;
        anyhow::ensure!(path.is_dir(), "--{}: '{}' is not a directory", name, path.display());
        Self::Directory(path)
      }
      ArgumentType::CacheVolume => {
        let volume = CacheVolume::open(name, absolute(Path::new(raw))?)
          .with_context(|| format!("creating cache volume for --{}", name))?;
        Self::CacheVolume(volume)
      }
    };
    Ok(value)
  }
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
  match raw.trim().to_ascii_lowercase().as_str() {
    "true" | "1" | "yes" => Ok(true),
    "false" | "0" | "no" | "" => Ok(false),
    other => anyhow::bail!("invalid boolean '{}'", other),
  }
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
  std::path::absolute(path).with_context(|| format!("resolving path '{}'", path.display()))
}
