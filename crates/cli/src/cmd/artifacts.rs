use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use shipyard_lib::argument::{CliValues, State};
use shipyard_lib::artifact::{DirectoryCache, InitContext};
use shipyard_lib::engine::Engine;
use shipyard_lib::pipeline::{ActionOpts, BuildContext, RunSummary, run};
use shipyard_lib::platform::paths::store_dir;
use shipyard_lib::store::{ArtifactStore, LoggingStore, MapStore};
use shipyard_lib::targets;

use crate::output::{OutputFormat, format_bytes, format_duration, print_info, print_json, print_stat, print_success};

fn default_parallel() -> usize {
  std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

#[derive(Args, Debug)]
pub struct ArtifactsArgs {
  /// Artifact descriptors, e.g. linux/amd64:grafana:targz (repeatable, comma-separated)
  #[arg(short, long = "artifacts", value_delimiter = ',', required = true)]
  pub artifacts: Vec<String>,

  /// Maximum number of export/verify tasks running at once
  #[arg(long, default_value_t = default_parallel())]
  pub parallel: usize,

  /// Directory receiving exported artifacts
  #[arg(long, default_value = "dist")]
  pub destination: PathBuf,

  /// Write a .sha256 sidecar next to every exported file
  #[arg(long)]
  pub checksum: bool,

  /// Run each artifact's verification after building
  #[arg(long)]
  pub verify: bool,

  /// Shared directory used as a remote build cache
  #[arg(long, value_name = "DIR")]
  pub remote_cache: Option<PathBuf>,

  /// Root for build outputs (defaults to $SHIPYARD_STORE or the user cache)
  #[arg(long, value_name = "DIR")]
  pub store: Option<PathBuf>,

  /// Output format
  #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
  pub output: OutputFormat,
}

pub async fn cmd_artifacts(args: ArtifactsArgs, values: CliValues) -> Result<()> {
  let start = Instant::now();
  let state = Arc::new(State::new(values));

  let mut init_ctx = InitContext::new(state.clone());
  if let Some(dir) = &args.remote_cache {
    info!(dir = %dir.display(), "using remote cache");
    init_ctx = init_ctx.with_remote_cache(Arc::new(DirectoryCache::new(dir)));
  }

  let root = args.store.clone().unwrap_or_else(store_dir);
  let store: Arc<dyn ArtifactStore> = Arc::new(LoggingStore::new(MapStore::new()));
  let build_ctx = BuildContext::new(state, store, Arc::new(Engine::new(&root)));

  let opts = ActionOpts {
    destination: args.destination.clone(),
    checksum: args.checksum,
    verify: args.verify,
    parallel: args.parallel,
  };

  let summary = run(&args.artifacts, &targets::initializers(), &init_ctx, &build_ctx, &opts)
    .await
    .context("artifact run failed")?;

  if args.output.is_json() {
    print_json(&summary)?;
  } else {
    print_summary(&summary, args.verify);
    print_stat("Duration", &format_duration(start.elapsed()));
  }
  Ok(())
}

fn print_summary(summary: &RunSummary, verify: bool) {
  for artifact in &summary.artifacts {
    print_success(&artifact.descriptor);
    print_stat("Filename", &artifact.filename);
    for path in &artifact.exported {
      let size = std::fs::metadata(path)
        .ok()
        .filter(|m| m.is_file())
        .map(|m| format!(" ({})", format_bytes(m.len())))
        .unwrap_or_default();
      print_stat("Exported", &format!("{}{}", path.display(), size));
    }
    if verify {
      print_stat("Verified", if artifact.verified { "yes" } else { "no" });
    }
  }
  if summary.artifacts.is_empty() {
    print_info("Nothing to do");
  }
}
