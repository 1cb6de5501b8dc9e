//! Run-scoped memoization of argument values.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{Argument, ArgumentType, ArgumentValue, CacheVolume, CliValues};

/// Errors returned by the [`State`] accessors.
#[derive(Debug, Error)]
pub enum StateError {
  /// The argument has no value function, so nothing can supply it.
  #[error("flag or value not provided for argument '{name}' ({description})")]
  NotProvided { name: String, description: String },

  /// The argument resolved to a different kind than the accessor expects.
  #[error("argument '{name}' is {actual}, expected {expected}")]
  UnexpectedType {
    name: String,
    expected: ArgumentType,
    actual: ArgumentType,
  },

  /// The value function failed. Not cached; a later call retries.
  #[error("failed to resolve argument '{name}'")]
  Resolve {
    name: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

/// Process-wide cache of resolved arguments for one orchestrator run.
///
/// Each argument name maps to a cell that is initialized at most once, even
/// when several tasks request the same unresolved argument concurrently: the
/// first caller runs the value function while the rest wait for its result.
/// A failed initialization leaves the cell empty.
#[derive(Debug, Default)]
pub struct State {
  cli: CliValues,
  values: Mutex<HashMap<&'static str, Arc<OnceCell<ArgumentValue>>>>,
}

impl State {
  pub fn new(cli: CliValues) -> Self {
    Self {
      cli,
      values: Mutex::new(HashMap::new()),
    }
  }

  /// CLI flag values available to value functions.
  pub fn cli(&self) -> &CliValues {
    &self.cli
  }

  /// Whether `name` has already been resolved in this run.
  pub fn is_resolved(&self, name: &str) -> bool {
    let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
    values.get(name).is_some_and(|cell| cell.initialized())
  }

  fn cell(&self, name: &'static str) -> Arc<OnceCell<ArgumentValue>> {
    let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
    values.entry(name).or_default().clone()
  }

  /// Resolve `argument`, running its value function only on first use.
  ///
  /// A value whose kind differs from the declared type is rejected and not
  /// stored.
  pub async fn resolve(&self, argument: &Argument) -> Result<ArgumentValue, StateError> {
    let cell = self.cell(argument.name);
    let value = cell
      .get_or_try_init(|| async {
        let Some(func) = &argument.value_func else {
          return Err(StateError::NotProvided {
            name: argument.name.to_string(),
            description: argument.description.to_string(),
          });
        };

        debug!(argument = argument.name, kind = %argument.argument_type, "resolving argument");
        let value = func.value(self).await.map_err(|e| StateError::Resolve {
          name: argument.name.to_string(),
          source: e.into(),
        })?;
        if value.kind() != argument.argument_type {
          return Err(unexpected(argument, argument.argument_type, &value));
        }
        Ok(value)
      })
      .await?;

    Ok(value.clone())
  }

  pub async fn string(&self, argument: &Argument) -> Result<String, StateError> {
    match self.resolve(argument).await? {
      ArgumentValue::String(value) => Ok(value),
      other => Err(unexpected(argument, ArgumentType::String, &other)),
    }
  }

  pub async fn int64(&self, argument: &Argument) -> Result<i64, StateError> {
    match self.resolve(argument).await? {
      ArgumentValue::Int64(value) => Ok(value),
      other => Err(unexpected(argument, ArgumentType::Int64, &other)),
    }
  }

  pub async fn bool(&self, argument: &Argument) -> Result<bool, StateError> {
    match self.resolve(argument).await? {
      ArgumentValue::Bool(value) => Ok(value),
      other => Err(unexpected(argument, ArgumentType::Bool, &other)),
    }
  }

  pub async fn file(&self, argument: &Argument) -> Result<PathBuf, StateError> {
    match self.resolve(argument).await? {
      ArgumentValue::File(value) => Ok(value),
      other => Err(unexpected(argument, ArgumentType::File, &other)),
    }
  }

  pub async fn directory(&self, argument: &Argument) -> Result<PathBuf, StateError> {
    match self.resolve(argument).await? {
      ArgumentValue::Directory(value) => Ok(value),
      other => Err(unexpected(argument, ArgumentType::Directory, &other)),
    }
  }

  pub async fn cache_volume(&self, argument: &Argument) -> Result<CacheVolume, StateError> {
    match self.resolve(argument).await? {
      ArgumentValue::CacheVolume(value) => Ok(value),
      other => Err(unexpected(argument, ArgumentType::CacheVolume, &other)),
    }
  }
}

fn unexpected(argument: &Argument, expected: ArgumentType, actual: &ArgumentValue) -> StateError {
  StateError::UnexpectedType {
    name: argument.name.to_string(),
    expected,
    actual: actual.kind(),
  }
}
