//! shipyard-lib: orchestration core for building release artifacts.
//!
//! A run turns descriptor strings such as `linux/amd64:enterprise:targz` into
//! artifacts, builds each one (dependencies first, at most once per
//! filename), then exports and verifies the results:
//! - `Argument` / `State`: lazily resolved, memoized configuration values
//! - `Flag` / `OptionsHandler`: descriptor tokens that overlay named options
//! - `Artifact` / `ArtifactHandler`: the capability contract of every target
//! - `ArtifactStore`: results keyed by artifact filename
//! - `pipeline`: parse, build and export/verify under a concurrency budget

pub mod argument;
pub mod arguments;
pub mod artifact;
pub mod consts;
pub mod engine;
pub mod flag;
pub mod pipeline;
pub mod platform;
pub mod store;
pub mod targets;
pub mod util;
