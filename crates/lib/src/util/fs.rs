//! Filesystem helpers shared by the store, the engine and the remote cache.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Copy a file or a directory tree to `dest`, replacing whatever is there.
///
/// Parent directories of `dest` are created as needed. Symlinks inside a
/// directory tree are recreated rather than followed.
pub fn copy_path(src: &Path, dest: &Path) -> io::Result<()> {
  remove_path(dest)?;
  if let Some(parent) = dest.parent() {
    fs::create_dir_all(parent)?;
  }

  if fs::metadata(src)?.is_file() {
    fs::copy(src, dest)?;
    return Ok(());
  }

  for entry in WalkDir::new(src).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    let rel_path = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    let target = dest.join(rel_path);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      fs::create_dir_all(&target)?;
    } else if file_type.is_symlink() {
      let link = fs::read_link(entry.path())?;
      symlink(&link, &target)?;
    } else {
      fs::copy(entry.path(), &target)?;
    }
  }

  Ok(())
}

/// Remove a file or directory if it exists.
pub fn remove_path(path: &Path) -> io::Result<()> {
  match fs::symlink_metadata(path) {
    Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
    Ok(_) => fs::remove_file(path),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  if target.is_dir() {
    std::os::windows::fs::symlink_dir(target, link)
  } else {
    std::os::windows::fs::symlink_file(target, link)
  }
}
