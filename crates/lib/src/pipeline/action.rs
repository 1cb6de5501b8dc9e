//! The artifacts action: parse, build, then export and verify.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{BuildContext, PipelineError, build_artifact};
use crate::artifact::{Artifact, ArtifactType, InitContext, Initializers, parse};

/// Options for the export/verify phase.
#[derive(Debug, Clone)]
pub struct ActionOpts {
  pub destination: PathBuf,
  /// Also write a `.sha256` sidecar next to every exported file.
  pub checksum: bool,
  pub verify: bool,
  /// Maximum number of export/verify tasks running at once.
  pub parallel: usize,
}

impl Default for ActionOpts {
  fn default() -> Self {
    Self {
      destination: PathBuf::from("dist"),
      checksum: false,
      verify: false,
      parallel: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
    }
  }
}

/// Outcome for one requested artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
  pub descriptor: String,
  pub filename: String,
  pub artifact_type: ArtifactType,
  pub exported: Vec<PathBuf>,
  pub verified: bool,
}

/// Outcome of a whole run, in request order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
  pub artifacts: Vec<ArtifactSummary>,
}

/// Parse every descriptor, build the results, then export and verify them.
///
/// Parsing completes for all descriptors before any build starts, so
/// descriptor errors surface before any build work. Requested artifacts
/// sharing a filename are exported once.
pub async fn run(
  descriptors: &[String],
  initializers: &Initializers,
  init_ctx: &InitContext,
  build_ctx: &BuildContext,
  opts: &ActionOpts,
) -> Result<RunSummary, PipelineError> {
  let mut artifacts = Vec::with_capacity(descriptors.len());
  for descriptor in descriptors {
    artifacts.push(parse(descriptor, initializers, init_ctx).await?);
  }

  let mut seen = HashSet::new();
  let mut requested = Vec::with_capacity(artifacts.len());
  for artifact in artifacts {
    let filename = artifact.filename().map_err(|source| PipelineError::Filename {
      descriptor: artifact.descriptor.clone(),
      source,
    })?;
    if seen.insert(filename) {
      requested.push(artifact);
    } else {
      debug!(descriptor = %artifact.descriptor, "duplicate request skipped");
    }
  }

  for artifact in &requested {
    build_artifact(build_ctx, artifact).await?;
  }
  info!(count = requested.len(), "built requested artifacts");

  export_and_verify(&requested, build_ctx, opts).await
}

enum TaskOutcome {
  Exported { index: usize, paths: Vec<PathBuf> },
  Verified { index: usize },
  /// The semaphore closed before this task got a slot.
  Skipped,
}

/// Export, and optionally verify, every artifact with at most
/// `opts.parallel` tasks in flight.
///
/// The failing task closes the semaphore before releasing its slot, so no
/// further task starts; tasks already running finish their current work.
/// The first error is returned.
pub async fn export_and_verify(
  artifacts: &[Arc<Artifact>],
  ctx: &BuildContext,
  opts: &ActionOpts,
) -> Result<RunSummary, PipelineError> {
  let semaphore = Arc::new(Semaphore::new(opts.parallel.max(1)));
  let mut summary = RunSummary::default();
  let mut tasks: JoinSet<Result<TaskOutcome, PipelineError>> = JoinSet::new();

  for (index, artifact) in artifacts.iter().enumerate() {
    let filename = artifact.filename().map_err(|source| PipelineError::Filename {
      descriptor: artifact.descriptor.clone(),
      source,
    })?;
    summary.artifacts.push(ArtifactSummary {
      descriptor: artifact.descriptor.clone(),
      filename: filename.clone(),
      artifact_type: artifact.artifact_type,
      exported: vec![],
      verified: false,
    });

    {
      let semaphore = semaphore.clone();
      let artifact = artifact.clone();
      let ctx = ctx.clone();
      let filename = filename.clone();
      let destination = opts.destination.clone();
      let checksum = opts.checksum;
      tasks.spawn(with_permit(semaphore, async move {
        let paths = ctx
          .store
          .export(&artifact, &destination, checksum)
          .await
          .map_err(|source| PipelineError::Export {
            descriptor: artifact.descriptor.clone(),
            filename,
            source,
          })?;
        Ok(TaskOutcome::Exported { index, paths })
      }));
    }

    if opts.verify {
      let semaphore = semaphore.clone();
      let artifact = artifact.clone();
      let ctx = ctx.clone();
      tasks.spawn(with_permit(semaphore, async move {
        verify(&artifact, &ctx, filename).await?;
        Ok(TaskOutcome::Verified { index })
      }));
    }
  }

  let mut first_error = None;
  while let Some(joined) = tasks.join_next().await {
    let outcome = joined.map_err(PipelineError::from).and_then(|result| result);
    match outcome {
      Ok(TaskOutcome::Exported { index, paths }) => summary.artifacts[index].exported = paths,
      Ok(TaskOutcome::Verified { index }) => summary.artifacts[index].verified = true,
      Ok(TaskOutcome::Skipped) => {}
      Err(e) => {
        if first_error.is_none() {
          warn!(error = %e, "stopping export/verify after first failure");
          semaphore.close();
          first_error = Some(e);
        } else {
          debug!(error = %e, "additional export/verify failure");
        }
      }
    }
  }

  match first_error {
    Some(e) => Err(e),
    None => Ok(summary),
  }
}

/// Run `work` under one permit of `semaphore`.
///
/// A failure closes the semaphore while the permit is still held, so every
/// waiter sees `Closed` instead of the freed slot.
async fn with_permit<F>(semaphore: Arc<Semaphore>, work: F) -> Result<TaskOutcome, PipelineError>
where
  F: Future<Output = Result<TaskOutcome, PipelineError>>,
{
  let Ok(_permit) = Arc::clone(&semaphore).acquire_owned().await else {
    return Ok(TaskOutcome::Skipped);
  };
  let result = work.await;
  if result.is_err() {
    semaphore.close();
  }
  result
}

async fn verify(artifact: &Artifact, ctx: &BuildContext, filename: String) -> Result<(), PipelineError> {
  let descriptor = artifact.descriptor.clone();
  let path = match artifact.artifact_type {
    ArtifactType::File => ctx.store.file(artifact).await,
    ArtifactType::Directory => ctx.store.directory(artifact).await,
  }
  .map_err(|source| PipelineError::Store {
    descriptor: descriptor.clone(),
    source,
  })?;

  let result = match artifact.artifact_type {
    ArtifactType::File => artifact.handler.verify_file(&ctx.engine, &path).await,
    ArtifactType::Directory => artifact.handler.verify_directory(&ctx.engine, &path).await,
  };
  result.map_err(|source| PipelineError::Verify {
    descriptor,
    filename,
    source,
  })
}
