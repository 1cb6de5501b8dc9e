//! Hashing utilities for cache keys and checksums.
//!
//! This module provides:
//! - `ObjectHash`: a truncated 20-character hash used for scratch directory names
//! - `ContentHash`: a full 64-character SHA-256 used for checksums and cache keys
//! - `hash_path()`: deterministic hashing of a file or a directory tree
//! - `hash_file()` / `hash_bytes()`: single file and raw byte hashing

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::consts::OBJ_HASH_PREFIX_LEN;

/// A truncated SHA-256 of a serialized definition.
///
/// The hash is a lowercase hexadecimal string, e.g. `"a1b2c3d4e5f6789012ab"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHash(pub String);

impl std::fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Types whose JSON serialization identifies them.
pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash, serde_json::Error> {
    let serialized = serde_json::to_string(self)?;
    let full = hash_bytes(serialized.as_bytes());
    Ok(ObjectHash(full.0[..OBJ_HASH_PREFIX_LEN].to_string()))
  }
}

/// A full 64-character SHA-256 hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Hash a file or a directory tree.
///
/// Directory hashes cover relative paths, file contents and symlink targets,
/// visited in sorted order. Timestamps and permissions are ignored.
pub fn hash_path(path: &Path) -> io::Result<ContentHash> {
  let metadata = fs::symlink_metadata(path)?;
  if metadata.is_file() {
    return hash_file(path);
  }

  let mut hasher = Sha256::new();
  for entry in WalkDir::new(path).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    let rel_path = entry.path().strip_prefix(path).unwrap_or(entry.path()).to_string_lossy().to_string();
    if rel_path.is_empty() {
      continue;
    }

    let file_type = entry.file_type();
    let line = if file_type.is_file() {
      format!("F:{}:{}", rel_path, hash_file(entry.path())?)
    } else if file_type.is_dir() {
      format!("D:{}", rel_path)
    } else if file_type.is_symlink() {
      let target = fs::read_link(entry.path())?;
      format!("L:{}:{}", rel_path, target.to_string_lossy())
    } else {
      continue;
    };

    hasher.update(line.as_bytes());
    hasher.update(b"\n");
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash a file's contents.
pub fn hash_file(path: &Path) -> io::Result<ContentHash> {
  let mut file = fs::File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  ContentHash(hex::encode(Sha256::digest(data)))
}
