//! Lazily resolved, typed configuration values.
//!
//! An [`Argument`] is a declaration: a unique name, the type of value it
//! resolves to, the CLI flags that can supply it, and a [`ValueFunc`] that
//! computes it on demand. Declarations are immutable and shared by reference
//! (`Arc<Argument>`) across every artifact that needs them.
//!
//! Values are resolved through a run-scoped [`State`], which memoizes each
//! argument by name so that side-effecting value functions (cloning a
//! repository, reading a manifest, creating a cache volume) run at most once.

mod state;
mod value;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

pub use state::{State, StateError};
pub use value::{ArgumentValue, CacheVolume};

/// The kind of value an argument resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgumentType {
  String,
  Int64,
  Bool,
  File,
  Directory,
  CacheVolume,
}

impl ArgumentType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::String => "string",
      Self::Int64 => "int64",
      Self::Bool => "bool",
      Self::File => "file",
      Self::Directory => "directory",
      Self::CacheVolume => "cache-volume",
    }
  }
}

impl fmt::Display for ArgumentType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// A CLI flag that can supply an argument's value.
///
/// The CLI layer registers one long option per flag; parsed values end up in
/// [`CliValues`] under the flag's name.
#[derive(Debug, Clone, Serialize)]
pub struct ArgumentFlag {
  pub name: &'static str,
  pub usage: &'static str,
  pub default: Option<&'static str>,
}

/// Computes an argument's value.
///
/// Implementations may perform I/O and may pull other arguments from the
/// state they are handed. Errors are not cached by [`State`].
#[async_trait]
pub trait ValueFunc: Send + Sync {
  async fn value(&self, state: &State) -> anyhow::Result<ArgumentValue>;
}

/// A named, typed, lazily-computed configuration value.
pub struct Argument {
  pub name: &'static str,
  pub description: &'static str,
  pub argument_type: ArgumentType,
  pub value_func: Option<Arc<dyn ValueFunc>>,
  pub flags: Vec<ArgumentFlag>,
  /// Arguments the value function pulls from [`State`]. Documentation only.
  pub requires: Vec<Arc<Argument>>,
}

impl fmt::Debug for Argument {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Argument")
      .field("name", &self.name)
      .field("argument_type", &self.argument_type)
      .field("has_value_func", &self.value_func.is_some())
      .field("flags", &self.flags)
      .field("requires", &self.requires.iter().map(|a| a.name).collect::<Vec<_>>())
      .finish()
  }
}

/// Raw CLI flag values, keyed by flag name.
#[derive(Debug, Clone, Default)]
pub struct CliValues(HashMap<String, String>);

impl CliValues {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
    self.0.insert(name.into(), value.into());
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.0.get(name).map(String::as_str)
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CliValues {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
  }
}

/// Reads an argument straight from a CLI flag, parsed as `argument_type`.
#[derive(Debug, Clone)]
pub struct FlagValue {
  pub flag: &'static str,
  pub argument_type: ArgumentType,
  /// Used when the flag is absent from [`CliValues`].
  pub default: Option<&'static str>,
}

impl FlagValue {
  pub fn new(flag: &'static str, argument_type: ArgumentType) -> Self {
    Self {
      flag,
      argument_type,
      default: None,
    }
  }

  pub fn with_default(mut self, default: &'static str) -> Self {
    self.default = Some(default);
    self
  }
}

#[async_trait]
impl ValueFunc for FlagValue {
  async fn value(&self, state: &State) -> anyhow::Result<ArgumentValue> {
    let Some(raw) = state.cli().get(self.flag).or(self.default) else {
      anyhow::bail!("flag --{} was not set", self.flag);
    };
    ArgumentValue::parse(self.argument_type, self.flag, raw)
  }
}
