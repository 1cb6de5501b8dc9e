//! Per-key async locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// Hands out one async mutex per key, so work on a key runs at most once at
/// a time while different keys proceed independently.
#[derive(Debug, Default)]
pub struct KeyedLocks {
  locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
  pub fn new() -> Self {
    Self::default()
  }

  /// Wait for exclusive access to `key`.
  pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
    let lock = {
      let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
      locks.entry(key.to_string()).or_default().clone()
    };
    lock.lock_owned().await
  }
}
