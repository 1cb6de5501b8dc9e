//! Run-scoped directory configuration.
//!
//! Every directory can be overridden through an environment variable so that
//! tests and CI runs stay isolated from the user's cache.

use std::path::PathBuf;

use crate::consts::APP_NAME;

/// Overrides the root under which build outputs and scratch files live.
pub const STORE_ENV: &str = "SHIPYARD_STORE";

/// Overrides the root for persistent cache volumes.
pub const CACHE_ENV: &str = "SHIPYARD_CACHE";

/// Returns the user's home directory, falling back to the system temp dir.
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  std::env::var("USERPROFILE")
    .map(PathBuf::from)
    .unwrap_or_else(|_| std::env::temp_dir())
}

/// Returns the user's home directory, falling back to the system temp dir.
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  std::env::var("HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| std::env::temp_dir())
}

/// Returns the directory for cache files for the application
#[cfg(windows)]
pub fn cache_dir() -> PathBuf {
  std::env::var("LOCALAPPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir())
    .join(APP_NAME)
    .join("Cache")
}

/// Returns the directory for cache files for the application
#[cfg(not(windows))]
pub fn cache_dir() -> PathBuf {
  let cache_home = std::env::var("XDG_CACHE_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".cache"));
  cache_home.join(APP_NAME)
}

/// Root for build outputs produced by the engine during a run.
pub fn store_dir() -> PathBuf {
  if let Ok(path) = std::env::var(STORE_ENV) {
    return PathBuf::from(path);
  }
  cache_dir().join("store")
}

/// Root for named cache volumes (module caches, package manager caches).
pub fn volumes_dir() -> PathBuf {
  if let Ok(path) = std::env::var(CACHE_ENV) {
    return PathBuf::from(path);
  }
  cache_dir().join("volumes")
}
