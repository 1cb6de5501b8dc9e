//! Crate-wide constants.

/// Application name, used for default directory names.
pub const APP_NAME: &str = "shipyard";

/// Length of the truncated hashes used for scratch directory names.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Extension appended to exported files for their checksum sidecar.
pub const CHECKSUM_EXTENSION: &str = "sha256";

/// Distribution used when a descriptor names none.
pub const DEFAULT_DISTRO: &str = "linux/amd64";
