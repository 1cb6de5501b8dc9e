//! Conflict-checked option maps built from descriptor tokens.

use std::collections::BTreeMap;

use tracing::trace;

use super::{Flag, FlagError, OptionKey, OptionValue};

/// Options collected from the flags a descriptor selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionsHandler {
  pub descriptor: String,
  options: BTreeMap<OptionKey, OptionValue>,
}

/// Apply every flag in `flags` whose name appears as a token of `descriptor`.
///
/// Token order does not matter. Tokens that match no flag are ignored; they
/// select the artifact type or the distribution instead.
pub fn parse_flags(descriptor: &str, flags: &[Flag]) -> Result<OptionsHandler, FlagError> {
  let mut handler = OptionsHandler::new(descriptor);
  for token in descriptor.split(':') {
    for flag in flags.iter().filter(|f| f.name == token) {
      handler.apply(flag)?;
    }
  }
  Ok(handler)
}

impl OptionsHandler {
  pub fn new(descriptor: impl Into<String>) -> Self {
    Self {
      descriptor: descriptor.into(),
      options: BTreeMap::new(),
    }
  }

  /// Merge `flag`'s options. Redefining a key already set is an error.
  pub fn apply(&mut self, flag: &Flag) -> Result<(), FlagError> {
    for (key, value) in &flag.options {
      if self.options.contains_key(key) {
        return Err(FlagError::DuplicateFlagOption {
          descriptor: self.descriptor.clone(),
          flag: flag.name.clone(),
          key: *key,
        });
      }
      trace!(descriptor = %self.descriptor, flag = %flag.name, key = %key, "applying flag option");
      self.options.insert(*key, value.clone());
    }
    Ok(())
  }

  pub fn get(&self, key: OptionKey) -> Result<&OptionValue, FlagError> {
    self.options.get(&key).ok_or_else(|| FlagError::FlagOptionNotFound {
      descriptor: self.descriptor.clone(),
      key,
    })
  }

  pub fn string(&self, key: OptionKey) -> Result<String, FlagError> {
    match self.get(key)? {
      OptionValue::String(value) => Ok(value.clone()),
      other => Err(self.mismatch(key, "string", other)),
    }
  }

  pub fn string_slice(&self, key: OptionKey) -> Result<Vec<String>, FlagError> {
    match self.get(key)? {
      OptionValue::StringSlice(value) => Ok(value.clone()),
      other => Err(self.mismatch(key, "string slice", other)),
    }
  }

  /// Like the other getters, except a missing key reads as `false`.
  pub fn bool(&self, key: OptionKey) -> Result<bool, FlagError> {
    match self.options.get(&key) {
      None => Ok(false),
      Some(OptionValue::Bool(value)) => Ok(*value),
      Some(other) => Err(self.mismatch(key, "bool", other)),
    }
  }

  /// Every option key that has been set, in sorted order.
  pub fn keys(&self) -> impl Iterator<Item = OptionKey> + '_ {
    self.options.keys().copied()
  }

  fn mismatch(&self, key: OptionKey, expected: &'static str, actual: &OptionValue) -> FlagError {
    FlagError::UnexpectedOptionType {
      descriptor: self.descriptor.clone(),
      key,
      expected,
      actual: actual.kind(),
    }
  }
}
