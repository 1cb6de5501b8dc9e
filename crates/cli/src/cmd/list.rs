use anyhow::Result;
use serde::Serialize;

use shipyard_lib::argument::ArgumentType;
use shipyard_lib::arguments;
use shipyard_lib::artifact::ArtifactType;
use shipyard_lib::targets;

use crate::output::{OutputFormat, print_info, print_json, print_stat};

#[derive(Serialize)]
struct ArtifactEntry {
  name: &'static str,
  artifact_type: ArtifactType,
  flags: Vec<String>,
}

#[derive(Serialize)]
struct ArgumentEntry {
  name: &'static str,
  argument_type: ArgumentType,
  description: &'static str,
  flags: Vec<String>,
}

#[derive(Serialize)]
struct Listing {
  artifacts: Vec<ArtifactEntry>,
  arguments: Vec<ArgumentEntry>,
}

fn listing() -> Listing {
  let artifacts = targets::initializers()
    .iter()
    .map(|initializer| ArtifactEntry {
      name: initializer.name(),
      artifact_type: initializer.artifact_type(),
      flags: initializer.flags().into_iter().map(|flag| flag.name).collect(),
    })
    .collect();

  let arguments = arguments::all()
    .iter()
    .map(|argument| ArgumentEntry {
      name: argument.name,
      argument_type: argument.argument_type,
      description: argument.description,
      flags: argument.flags.iter().map(|flag| format!("--{}", flag.name)).collect(),
    })
    .collect();

  Listing { artifacts, arguments }
}

pub fn cmd_list(output: OutputFormat) -> Result<()> {
  let listing = listing();
  if output.is_json() {
    return print_json(&listing);
  }

  print_info("Artifact types");
  for artifact in &listing.artifacts {
    print_stat(
      artifact.name,
      &format!("{} [{}]", artifact.artifact_type, artifact.flags.join(", ")),
    );
  }

  println!();
  print_info("Build arguments");
  for argument in &listing.arguments {
    print_stat(
      argument.name,
      &format!(
        "{} {} - {}",
        argument.argument_type,
        argument.flags.join(" "),
        argument.description
      ),
    );
  }
  Ok(())
}
