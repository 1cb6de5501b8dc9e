mod artifacts;
mod list;

pub use artifacts::{ArtifactsArgs, cmd_artifacts};
pub use list::cmd_list;
