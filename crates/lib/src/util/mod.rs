//! Shared utilities.
//!
//! Hashing for remote-cache keys and checksum sidecars, plus filesystem helpers.

pub mod fs;
pub mod hash;
