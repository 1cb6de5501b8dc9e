//! Release archives (`.tar.gz` and `.zip`) bundling backend and frontend.
//!
//! Archives are written in-process and byte-for-byte reproducible: entries
//! are sorted, timestamps and ownership are zeroed, and file modes are
//! normalized to `0644`/`0755`.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use walkdir::WalkDir;

use super::{BackendInitializer, Distribution, FrontendInitializer, Release, product_flags, replace_type};
use crate::artifact::{Artifact, ArtifactError, ArtifactHandler, ArtifactInitializer, ArtifactType, BuildOpts, InitContext};
use crate::engine::{Builder, Engine};
use crate::flag::{Flag, parse_flags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
  TarGz,
  Zip,
}

impl ArchiveFormat {
  /// Descriptor token selecting this format.
  pub fn name(&self) -> &'static str {
    match self {
      Self::TarGz => "targz",
      Self::Zip => "zip",
    }
  }

  pub fn extension(&self) -> &'static str {
    match self {
      Self::TarGz => "tar.gz",
      Self::Zip => "zip",
    }
  }
}

impl fmt::Display for ArchiveFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

/// One archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
  /// Path inside the archive, `/`-separated.
  name: String,
  kind: EntryKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EntryKind {
  Dir,
  File { source: PathBuf, executable: bool },
  Inline(Vec<u8>),
}

impl EntryKind {
  fn mode(&self) -> u32 {
    match self {
      Self::Dir | Self::File { executable: true, .. } => 0o755,
      _ => 0o644,
    }
  }
}

/// Sorted entries for `root/<prefix>/...` covering every source tree.
fn collect_entries(root: &str, trees: &[(&str, &Path)], extra: Vec<Entry>) -> io::Result<Vec<Entry>> {
  let mut entries = vec![Entry {
    name: root.to_string(),
    kind: EntryKind::Dir,
  }];

  for (prefix, tree) in trees {
    for item in WalkDir::new(tree).sort_by_file_name().follow_links(true) {
      let item = item.map_err(io::Error::other)?;
      let rel = item.path().strip_prefix(tree).map_err(io::Error::other)?;
      let mut name = format!("{root}/{prefix}");
      for component in rel.components() {
        name.push('/');
        name.push_str(&component.as_os_str().to_string_lossy());
      }

      let kind = if item.file_type().is_dir() {
        EntryKind::Dir
      } else {
        EntryKind::File {
          source: item.path().to_path_buf(),
          executable: is_executable(&item.metadata().map_err(io::Error::other)?),
        }
      };
      entries.push(Entry { name, kind });
    }
  }

  entries.extend(extra);
  entries.sort_by(|a, b| a.name.cmp(&b.name));
  Ok(entries)
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
  use std::os::unix::fs::PermissionsExt;
  metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
  false
}

fn write_tar_gz(entries: &[Entry], dest: &Path) -> io::Result<()> {
  let encoder = GzEncoder::new(BufWriter::new(File::create(dest)?), Compression::default());
  let mut builder = tar::Builder::new(encoder);

  for entry in entries {
    let mut header = tar::Header::new_gnu();
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mode(entry.kind.mode());
    match &entry.kind {
      EntryKind::Dir => {
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        builder.append_data(&mut header, format!("{}/", entry.name), io::empty())?;
      }
      EntryKind::File { source, .. } => {
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(fs::metadata(source)?.len());
        builder.append_data(&mut header, &entry.name, File::open(source)?)?;
      }
      EntryKind::Inline(bytes) => {
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(bytes.len() as u64);
        builder.append_data(&mut header, &entry.name, bytes.as_slice())?;
      }
    }
  }

  let encoder = builder.into_inner()?;
  encoder.finish()?.flush()
}

fn write_zip(entries: &[Entry], dest: &Path) -> io::Result<()> {
  use zip::write::SimpleFileOptions;

  let mut writer = zip::ZipWriter::new(BufWriter::new(File::create(dest)?));
  let base = SimpleFileOptions::default()
    .compression_method(zip::CompressionMethod::Deflated)
    .last_modified_time(zip::DateTime::default());

  for entry in entries {
    let options = base.unix_permissions(entry.kind.mode());
    match &entry.kind {
      EntryKind::Dir => writer.add_directory(entry.name.as_str(), options).map_err(io::Error::other)?,
      EntryKind::File { source, .. } => {
        writer.start_file(entry.name.as_str(), options).map_err(io::Error::other)?;
        io::copy(&mut File::open(source)?, &mut writer)?;
      }
      EntryKind::Inline(bytes) => {
        writer.start_file(entry.name.as_str(), options).map_err(io::Error::other)?;
        writer.write_all(bytes)?;
      }
    }
  }

  writer.finish().map_err(io::Error::other)?.flush()
}

/// Every member name of an archive, directories with a trailing `/`.
fn list_entries(format: ArchiveFormat, path: &Path) -> io::Result<Vec<String>> {
  let file = BufReader::new(File::open(path)?);
  match format {
    ArchiveFormat::TarGz => {
      let mut archive = tar::Archive::new(GzDecoder::new(file));
      let mut names = Vec::new();
      for entry in archive.entries()? {
        let entry = entry?;
        let mut name = entry.path()?.to_string_lossy().to_string();
        if entry.header().entry_type().is_dir() && !name.ends_with('/') {
          name.push('/');
        }
        names.push(name);
      }
      Ok(names)
    }
    ArchiveFormat::Zip => {
      let archive = zip::ZipArchive::new(file).map_err(io::Error::other)?;
      Ok(archive.file_names().map(str::to_string).collect())
    }
  }
}

pub struct ArchiveHandler {
  pub format: ArchiveFormat,
  pub release: Release,
  pub distro: Distribution,
  backend: Arc<Artifact>,
  frontend: Arc<Artifact>,
}

impl ArchiveHandler {
  fn required_entries(&self) -> Vec<String> {
    let root = self.release.root_dir();
    vec![format!("{root}/VERSION"), format!("{root}/bin/"), format!("{root}/public/")]
  }
}

#[async_trait]
impl ArtifactHandler for ArchiveHandler {
  fn filename(&self) -> Result<String, ArtifactError> {
    Ok(format!(
      "{}_{}.{}",
      self.release.stem(),
      self.distro.slug(),
      self.format.extension()
    ))
  }

  async fn dependencies(&self) -> Result<Vec<Arc<Artifact>>, ArtifactError> {
    Ok(vec![self.backend.clone(), self.frontend.clone()])
  }

  async fn builder(&self, opts: &BuildOpts<'_>) -> Result<Builder, ArtifactError> {
    let backend = opts.store.directory(&self.backend).await?;
    let frontend = opts.store.directory(&self.frontend).await?;
    Ok(
      Builder::new(format!("{}-{}", self.format, self.distro.slug()))
        .with_input("backend", backend)
        .with_input("frontend", frontend)
        .with_env("ROOT", self.release.root_dir())
        .with_env("VERSION", &self.release.version),
    )
  }

  async fn build_file(&self, builder: &Builder, opts: &BuildOpts<'_>) -> Result<PathBuf, ArtifactError> {
    let out = opts.engine.output_dir(builder).await?;
    let dest = out.join(self.filename()?);
    let root = self.release.root_dir();
    let version = Entry {
      name: format!("{root}/VERSION"),
      kind: EntryKind::Inline(format!("{}\n", self.release.version).into_bytes()),
    };
    let backend = builder.input("backend")?.to_path_buf();
    let frontend = builder.input("frontend")?.to_path_buf();
    let format = self.format;

    let archive = dest.clone();
    tokio::task::spawn_blocking(move || -> io::Result<()> {
      let entries = collect_entries(&root, &[("bin", backend.as_path()), ("public", frontend.as_path())], vec![version])?;
      match format {
        ArchiveFormat::TarGz => write_tar_gz(&entries, &archive),
        ArchiveFormat::Zip => write_zip(&entries, &archive),
      }
    })
    .await??;
    Ok(dest)
  }

  async fn verify_file(&self, _engine: &Engine, file: &Path) -> Result<(), ArtifactError> {
    let format = self.format;
    let path = file.to_path_buf();
    let names = tokio::task::spawn_blocking(move || list_entries(format, &path)).await??;

    for required in self.required_entries() {
      if !names.iter().any(|name| name == &required) {
        return Err(ArtifactError::Verification(format!(
          "{} is missing {}",
          file.display(),
          required
        )));
      }
    }
    Ok(())
  }
}

pub struct ArchiveInitializer(pub ArchiveFormat);

#[async_trait]
impl ArtifactInitializer for ArchiveInitializer {
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
    let backend = BackendInitializer
      .initialize(&replace_type(descriptor, self.name(), "backend"), ctx)
      .await?;
    let frontend = FrontendInitializer
      .initialize(&replace_type(descriptor, self.name(), "frontend"), ctx)
      .await?;

    let handler = ArchiveHandler {
      format: self.0,
      release: Release::resolve(&options, &ctx.state).await?,
      distro: Distribution::from_descriptor(descriptor)?,
      backend,
      frontend,
    };
    Ok(ctx.artifact(descriptor, self.artifact_type(), flags, handler))
  }
}
