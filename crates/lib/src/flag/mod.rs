//! Descriptor tokens that overlay named options.
//!
//! A [`Flag`] maps one token of an artifact descriptor (for example `boring`
//! in `linux/amd64:boring:targz`) to a bundle of options. Parsing a descriptor
//! applies every matching flag into an [`OptionsHandler`]; two flags may never
//! set the same [`OptionKey`].

mod options;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub use options::{OptionsHandler, parse_flags};

/// Name of an option set by a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct OptionKey(pub &'static str);

impl fmt::Display for OptionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// An option value, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
  Bool(bool),
  String(String),
  StringSlice(Vec<String>),
}

impl OptionValue {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Bool(_) => "bool",
      Self::String(_) => "string",
      Self::StringSlice(_) => "string slice",
    }
  }
}

impl From<bool> for OptionValue {
  fn from(value: bool) -> Self {
    Self::Bool(value)
  }
}

impl From<&str> for OptionValue {
  fn from(value: &str) -> Self {
    Self::String(value.to_string())
  }
}

impl From<Vec<&str>> for OptionValue {
  fn from(value: Vec<&str>) -> Self {
    Self::StringSlice(value.into_iter().map(String::from).collect())
  }
}

/// A descriptor token and the options it sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flag {
  pub name: String,
  pub options: BTreeMap<OptionKey, OptionValue>,
}

impl Flag {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      options: BTreeMap::new(),
    }
  }

  /// Builder-style option setter.
  pub fn with(mut self, key: OptionKey, value: impl Into<OptionValue>) -> Self {
    self.options.insert(key, value.into());
    self
  }
}

/// Errors raised while applying flags or reading options.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlagError {
  #[error("flag '{flag}' sets option '{key}', which another flag in '{descriptor}' already set")]
  DuplicateFlagOption {
    descriptor: String,
    flag: String,
    key: OptionKey,
  },

  #[error("option '{key}' not found for artifact '{descriptor}'")]
  FlagOptionNotFound { descriptor: String, key: OptionKey },

  #[error("option '{key}' for artifact '{descriptor}' is a {actual}, expected {expected}")]
  UnexpectedOptionType {
    descriptor: String,
    key: OptionKey,
    expected: &'static str,
    actual: &'static str,
  },
}
