//! Descriptor parsing and the registry of artifact types.
//!
//! A descriptor such as `linux/amd64:grafana:targz` is split on `:`. Exactly
//! one token must name a registered [`ArtifactInitializer`]; the remaining
//! tokens are left for the initializer to interpret as flags or as the
//! target distribution.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::{Artifact, ArtifactError, ArtifactHandler, ArtifactType, LoggingHandler, RemoteCache, RemoteCacheHandler};
use crate::argument::State;
use crate::flag::Flag;

/// Errors raised while turning descriptors into artifacts.
#[derive(Debug, Error)]
pub enum ParseError {
  #[error("no artifact type found in '{descriptor}' (known types: {known})")]
  NoArtifact { descriptor: String, known: String },

  #[error("descriptor '{descriptor}' names more than one artifact type: {names:?}")]
  ArtifactCollision { descriptor: String, names: Vec<String> },

  #[error("failed to initialize '{descriptor}'")]
  Initialize {
    descriptor: String,
    #[source]
    source: ArtifactError,
  },
}

/// Constructs artifacts of one type from descriptors.
#[async_trait]
pub trait ArtifactInitializer: Send + Sync {
  /// The descriptor token selecting this type.
  fn name(&self) -> &'static str;

  fn artifact_type(&self) -> ArtifactType;

  /// Flags this type understands.
  fn flags(&self) -> Vec<Flag>;

  /// Build the artifact, resolving arguments and nested dependencies.
  async fn initialize(&self, descriptor: &str, ctx: &InitContext) -> Result<Arc<Artifact>, ArtifactError>;
}

/// Registered artifact types, keyed by name.
#[derive(Default, Clone)]
pub struct Initializers {
  by_name: BTreeMap<&'static str, Arc<dyn ArtifactInitializer>>,
}

impl Initializers {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, initializer: impl ArtifactInitializer + 'static) {
    self.by_name.insert(initializer.name(), Arc::new(initializer));
  }

  pub fn with(mut self, initializer: impl ArtifactInitializer + 'static) -> Self {
    self.register(initializer);
    self
  }

  pub fn get(&self, name: &str) -> Option<&Arc<dyn ArtifactInitializer>> {
    self.by_name.get(name)
  }

  /// Registered initializers in name order.
  pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ArtifactInitializer>> {
    self.by_name.values()
  }

  pub fn names(&self) -> Vec<&'static str> {
    self.by_name.keys().copied().collect()
  }
}

/// Find the single initializer named by a token of `descriptor`.
pub fn find_initializer<'a>(
  descriptor: &str,
  initializers: &'a Initializers,
) -> Result<&'a Arc<dyn ArtifactInitializer>, ParseError> {
  let mut matches: Vec<&'a Arc<dyn ArtifactInitializer>> = Vec::new();
  for token in descriptor.split(':') {
    if let Some(initializer) = initializers.get(token)
      && !matches.iter().any(|m| m.name() == initializer.name())
    {
      matches.push(initializer);
    }
  }

  match matches.as_slice() {
    [single] => Ok(*single),
    [] => Err(ParseError::NoArtifact {
      descriptor: descriptor.to_string(),
      known: initializers.names().join(", "),
    }),
    many => Err(ParseError::ArtifactCollision {
      descriptor: descriptor.to_string(),
      names: many.iter().map(|m| m.name().to_string()).collect(),
    }),
  }
}

/// Parse `descriptor` into an artifact using the registered initializers.
pub async fn parse(
  descriptor: &str,
  initializers: &Initializers,
  ctx: &InitContext,
) -> Result<Arc<Artifact>, ParseError> {
  let initializer = find_initializer(descriptor, initializers)?;
  debug!(descriptor = %descriptor, artifact_type = initializer.name(), "initializing artifact");
  initializer
    .initialize(descriptor, ctx)
    .await
    .map_err(|source| ParseError::Initialize {
      descriptor: descriptor.to_string(),
      source,
    })
}

/// Shared inputs for artifact construction.
#[derive(Clone)]
pub struct InitContext {
  pub state: Arc<State>,
  pub remote_cache: Option<Arc<dyn RemoteCache>>,
}

impl InitContext {
  pub fn new(state: Arc<State>) -> Self {
    Self {
      state,
      remote_cache: None,
    }
  }

  pub fn with_remote_cache(mut self, cache: Arc<dyn RemoteCache>) -> Self {
    self.remote_cache = Some(cache);
    self
  }

  /// Wrap `handler` in the configured decorators and build the artifact.
  ///
  /// Layering, innermost first: the concrete handler, the remote cache (when
  /// configured), then logging as the outermost layer so that cache hits are
  /// logged like any other build.
  pub fn artifact(
    &self,
    descriptor: &str,
    artifact_type: ArtifactType,
    flags: Vec<Flag>,
    handler: impl ArtifactHandler + 'static,
  ) -> Arc<Artifact> {
    let mut handler: Box<dyn ArtifactHandler> = Box::new(handler);
    if let Some(cache) = &self.remote_cache {
      handler = Box::new(RemoteCacheHandler::new(handler, cache.clone()));
    }
    let handler = Box::new(LoggingHandler::new(descriptor, handler));

    Arc::new(Artifact {
      descriptor: descriptor.to_string(),
      artifact_type,
      flags,
      handler,
    })
  }
}
