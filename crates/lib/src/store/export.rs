//! Copying stored payloads to an export destination.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use super::{Payload, StoreError};
use crate::consts::CHECKSUM_EXTENSION;
use crate::util::fs::copy_path;
use crate::util::hash::hash_file;

/// Copy `payload` to `destination/filename`.
///
/// When `checksum` is set and the payload is a file, also writes
/// `<filename>.sha256` holding the hex digest of the exported bytes.
/// Re-exporting replaces previous output, so repeated exports are identical.
pub async fn export_payload(
  payload: &Payload,
  destination: &Path,
  filename: &str,
  checksum: bool,
) -> Result<Vec<PathBuf>, StoreError> {
  let target = destination.join(checked_relative(filename)?);
  let payload = payload.clone();

  let written = tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>, StoreError> {
    copy_path(payload.path(), &target)?;
    let mut written = vec![target.clone()];

    if checksum && matches!(payload, Payload::File(_)) {
      let digest = hash_file(&target)?;
      let mut sidecar = target.clone().into_os_string();
      sidecar.push(".");
      sidecar.push(CHECKSUM_EXTENSION);
      let sidecar = PathBuf::from(sidecar);
      std::fs::write(&sidecar, digest.0.as_bytes())?;
      written.push(sidecar);
    }

    Ok(written)
  })
  .await??;

  debug!(filename, paths = written.len(), "exported artifact");
  Ok(written)
}

/// Reject filenames that would escape the destination.
fn checked_relative(filename: &str) -> Result<&Path, StoreError> {
  let path = Path::new(filename);
  let valid = !filename.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
  if valid {
    Ok(path)
  } else {
    Err(StoreError::InvalidFilename {
      filename: filename.to_string(),
    })
  }
}
