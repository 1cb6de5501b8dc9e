//! Host-specific configuration.

pub mod paths;
