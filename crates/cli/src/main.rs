mod cmd;
mod flags;
mod output;

use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::ArtifactsArgs;
use output::{OutputFormat, print_error};

/// shipyard - build, export and verify release artifacts
#[derive(Parser)]
#[command(name = "shipyard")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Increase log verbosity (-v info, -vv debug, -vvv trace)
  #[arg(short, long, global = true, action = clap::ArgAction::Count)]
  verbose: u8,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build the requested artifacts, then export and optionally verify them
  Artifacts(ArtifactsArgs),

  /// List artifact types, their flags, and build arguments
  List {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },
}

fn init_logging(verbose: u8) {
  let level = match verbose {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn run() -> Result<()> {
  let arguments = shipyard_lib::arguments::all();
  let command = Cli::command().mut_subcommand("artifacts", |sub| flags::register(sub, &arguments));
  let matches = command.get_matches();
  let cli = Cli::from_arg_matches(&matches)?;

  init_logging(cli.verbose);

  match cli.command {
    Commands::Artifacts(args) => {
      let values = matches
        .subcommand_matches("artifacts")
        .map(|sub| flags::collect(sub, &arguments))
        .unwrap_or_default();
      let runtime = tokio::runtime::Runtime::new()?;
      runtime.block_on(cmd::cmd_artifacts(args, values))
    }
    Commands::List { output } => cmd::cmd_list(output),
  }
}

fn main() -> ExitCode {
  match run() {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&e);
      ExitCode::FAILURE
    }
  }
}
