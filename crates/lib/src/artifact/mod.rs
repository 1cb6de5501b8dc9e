//! Buildable targets.
//!
//! An [`Artifact`] pairs the descriptor a user asked for with the
//! [`ArtifactHandler`] that knows how to build, name and verify it. Handlers
//! are polymorphic: the orchestrator drives every artifact type through the
//! same generic code and never branches on the concrete type.
//!
//! # Submodules
//!
//! - [`handler`] - the capability trait every artifact type implements
//! - [`initializer`] - descriptor parsing and the registry of artifact types
//! - [`logging`] - decorator bracketing each handler call with log lines
//! - [`remote_cache`] - decorator restoring outputs from a shared cache

pub mod handler;
pub mod initializer;
pub mod logging;
pub mod remote_cache;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::argument::StateError;
use crate::engine::EngineError;
use crate::flag::{Flag, FlagError};
use crate::store::StoreError;

pub use handler::{ArtifactHandler, BuildOpts};
pub use initializer::{ArtifactInitializer, InitContext, Initializers, ParseError, find_initializer, parse};
pub use logging::LoggingHandler;
pub use remote_cache::{DirectoryCache, RemoteCache, RemoteCacheHandler};

/// Whether an artifact's payload is a single file or a directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
  File,
  Directory,
}

impl fmt::Display for ArtifactType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::File => write!(f, "file"),
      Self::Directory => write!(f, "directory"),
    }
  }
}

/// Errors raised by artifact handlers.
#[derive(Debug, Error)]
pub enum ArtifactError {
  /// The handler does not implement this operation.
  #[error("{operation} is not supported by this artifact")]
  NotSupported { operation: &'static str },

  #[error("invalid artifact descriptor '{descriptor}': {message}")]
  InvalidDescriptor { descriptor: String, message: String },

  #[error("verification failed: {0}")]
  Verification(String),

  #[error(transparent)]
  Flag(#[from] FlagError),

  #[error(transparent)]
  State(#[from] StateError),

  #[error(transparent)]
  Engine(#[from] EngineError),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl From<tokio::task::JoinError> for ArtifactError {
  fn from(err: tokio::task::JoinError) -> Self {
    Self::Engine(EngineError::Task(err))
  }
}

/// One buildable target.
///
/// Artifacts are immutable once constructed and shared through `Arc`, so the
/// same dependency may hang under several dependents.
pub struct Artifact {
  pub descriptor: String,
  pub artifact_type: ArtifactType,
  /// The flag set the descriptor was parsed against.
  pub flags: Vec<Flag>,
  pub handler: Box<dyn ArtifactHandler>,
}

impl Artifact {
  /// The store key for this artifact.
  pub fn filename(&self) -> Result<String, ArtifactError> {
    self.handler.filename()
  }
}

impl fmt::Debug for Artifact {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Artifact")
      .field("descriptor", &self.descriptor)
      .field("artifact_type", &self.artifact_type)
      .field("flags", &self.flags.iter().map(|flag| flag.name.as_str()).collect::<Vec<_>>())
      .finish_non_exhaustive()
  }
}
