//! Whole runs: parse, build, export and verify.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use shipyard_lib::argument::{CliValues, State};
use shipyard_lib::artifact::{
  Artifact, ArtifactError, ArtifactInitializer, ArtifactType, InitContext, Initializers, ParseError, parse,
};
use shipyard_lib::engine::Engine;
use shipyard_lib::flag::Flag;
use shipyard_lib::pipeline::{ActionOpts, BuildContext, PipelineError, build_artifact, export_and_verify, run};
use shipyard_lib::store::{ArtifactStore, LoggingStore, MapStore};
use shipyard_lib::targets;
use shipyard_lib::util::hash::hash_file;
use tempfile::TempDir;

use crate::common::{Gauge, Probe, Recorder, artifact};

struct Fixed {
  name: &'static str,
  probe: Arc<Probe>,
}

#[async_trait]
impl ArtifactInitializer for Fixed {
  fn name(&self) -> &'static str {
    self.name
  }

  fn artifact_type(&self) -> ArtifactType {
    ArtifactType::File
  }

  fn flags(&self) -> Vec<Flag> {
    vec![]
  }

  async fn initialize(&self, descriptor: &str, ctx: &InitContext) -> Result<Arc<Artifact>, ArtifactError> {
    let handler = Recorder {
      filename: format!("{}.bin", self.name),
      probe: self.probe.clone(),
    };
    Ok(ctx.artifact(descriptor, ArtifactType::File, vec![], handler))
  }
}

fn contexts(temp: &TempDir, cli: CliValues) -> (InitContext, BuildContext) {
  let state = Arc::new(State::new(cli));
  let store: Arc<dyn ArtifactStore> = Arc::new(LoggingStore::new(MapStore::new()));
  let engine = Arc::new(Engine::new(temp.path().join("engine")));
  (
    InitContext::new(state.clone()),
    BuildContext::new(state, store, engine),
  )
}

fn opts(temp: &TempDir, verify: bool, parallel: usize) -> ActionOpts {
  ActionOpts {
    destination: temp.path().join("dist"),
    checksum: true,
    verify,
    parallel,
  }
}

fn descriptors(values: &[&str]) -> Vec<String> {
  values.iter().map(|s| s.to_string()).collect()
}

/// A project whose backend and frontend recipes are plain shell commands.
#[cfg(unix)]
fn project(temp: &TempDir) -> CliValues {
  let source = temp.path().join("src");
  std::fs::create_dir_all(&source).unwrap();
  std::fs::write(source.join("package.json"), r#"{"name":"grafana","version":"1.2.3"}"#).unwrap();

  let mut cli = CliValues::new();
  cli.set("source", source.to_string_lossy());
  cli.set("build-id", "7");
  cli.set("cache-dir", temp.path().join("cache").to_string_lossy());
  cli.set("backend-command", "printf 'server' > \"$out/grafana\" && chmod +x \"$out/grafana\"");
  cli.set(
    "frontend-command",
    "mkdir -p \"$out/build\" && printf '<html/>' > \"$out/build/index.html\"",
  );
  cli
}

#[cfg(unix)]
#[tokio::test]
async fn targz_export_is_reproducible_with_checksum() {
  let temp = TempDir::new().unwrap();
  let (init_ctx, build_ctx) = contexts(&temp, project(&temp));
  let initializers = targets::initializers();

  let summary = run(
    &descriptors(&["linux/amd64:targz"]),
    &initializers,
    &init_ctx,
    &build_ctx,
    &opts(&temp, true, 4),
  )
  .await
  .unwrap();

  assert_eq!(summary.artifacts.len(), 1);
  let entry = &summary.artifacts[0];
  assert_eq!(entry.filename, "grafana_1.2.3_7_linux-amd64.tar.gz");
  assert!(entry.verified);

  let archive = temp.path().join("dist").join(&entry.filename);
  let sidecar = temp.path().join("dist/grafana_1.2.3_7_linux-amd64.tar.gz.sha256");
  assert_eq!(entry.exported, vec![archive.clone(), sidecar.clone()]);
  assert_eq!(std::fs::read_to_string(&sidecar).unwrap(), hash_file(&archive).unwrap().0);

  // Export the stored artifact a second time, elsewhere.
  let again = parse("linux/amd64:targz", &initializers, &init_ctx).await.unwrap();
  let second = ActionOpts {
    destination: temp.path().join("dist2"),
    ..opts(&temp, false, 1)
  };
  let summary = export_and_verify(&[again], &build_ctx, &second).await.unwrap();
  let copy = &summary.artifacts[0].exported;
  assert_eq!(std::fs::read(&archive).unwrap(), std::fs::read(&copy[0]).unwrap());
  assert_eq!(std::fs::read(&sidecar).unwrap(), std::fs::read(&copy[1]).unwrap());
}

#[cfg(unix)]
#[tokio::test]
async fn zip_and_targz_share_backend_and_frontend() {
  let temp = TempDir::new().unwrap();
  let (init_ctx, build_ctx) = contexts(&temp, project(&temp));

  let summary = run(
    &descriptors(&["linux/arm64:targz", "zip:linux/arm64", "linux/arm64:targz"]),
    &targets::initializers(),
    &init_ctx,
    &build_ctx,
    &opts(&temp, true, 2),
  )
  .await
  .unwrap();

  let filenames: Vec<_> = summary.artifacts.iter().map(|a| a.filename.as_str()).collect();
  assert_eq!(
    filenames,
    vec!["grafana_1.2.3_7_linux-arm64.tar.gz", "grafana_1.2.3_7_linux-arm64.zip"]
  );
  assert!(summary.artifacts.iter().all(|a| a.verified));

  let backends = std::fs::read_dir(temp.path().join("engine/out"))
    .unwrap()
    .filter(|entry| {
      let name = entry.as_ref().unwrap().file_name();
      name.to_string_lossy().starts_with("backend-")
    })
    .count();
  assert_eq!(backends, 1);
}

#[tokio::test]
async fn descriptor_errors_abort_before_building() {
  let temp = TempDir::new().unwrap();
  let probe = Arc::new(Probe::default());
  let initializers = Initializers::new()
    .with(Fixed {
      name: "targz",
      probe: probe.clone(),
    })
    .with(Fixed {
      name: "deb",
      probe: probe.clone(),
    });
  let (init_ctx, build_ctx) = contexts(&temp, CliValues::new());

  let err = run(
    &descriptors(&["linux/amd64:targz", "linux/amd64:msi"]),
    &initializers,
    &init_ctx,
    &build_ctx,
    &opts(&temp, false, 1),
  )
  .await
  .unwrap_err();
  assert!(matches!(err, PipelineError::Parse(ParseError::NoArtifact { .. })));

  let err = run(
    &descriptors(&["targz:deb"]),
    &initializers,
    &init_ctx,
    &build_ctx,
    &opts(&temp, false, 1),
  )
  .await
  .unwrap_err();
  assert!(matches!(err, PipelineError::Parse(ParseError::ArtifactCollision { .. })));

  assert_eq!(probe.builds.load(Ordering::SeqCst), 0);
  assert!(!temp.path().join("dist").exists());
}

#[tokio::test]
async fn verify_failure_is_returned() {
  let temp = TempDir::new().unwrap();
  let good = Arc::new(Probe::default());
  let bad = Arc::new(Probe::default());
  *bad.fail_verify.lock().unwrap() = true;

  let initializers = Initializers::new()
    .with(Fixed {
      name: "good",
      probe: good.clone(),
    })
    .with(Fixed {
      name: "bad",
      probe: bad.clone(),
    });
  let (init_ctx, build_ctx) = contexts(&temp, CliValues::new());

  let err = run(
    &descriptors(&["good", "bad"]),
    &initializers,
    &init_ctx,
    &build_ctx,
    &opts(&temp, true, 4),
  )
  .await
  .unwrap_err();

  match err {
    PipelineError::Verify { descriptor, filename, .. } => {
      assert_eq!(descriptor, "bad");
      assert_eq!(filename, "bad.bin");
    }
    other => panic!("expected a verify error, got {other}"),
  }
  // Both were built before the export/verify phase started.
  assert_eq!(good.builds.load(Ordering::SeqCst), 1);
  assert_eq!(bad.builds.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_budget_bounds_tasks() {
  const NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

  let temp = TempDir::new().unwrap();
  let gauge = Arc::new(Gauge::default());
  let mut initializers = Initializers::new();
  let mut probes = Vec::new();
  for name in NAMES {
    let probe = Arc::new(Probe {
      in_flight: Some(gauge.clone()),
      ..Probe::default()
    });
    probes.push(probe.clone());
    initializers.register(Fixed { name, probe });
  }
  let (init_ctx, build_ctx) = contexts(&temp, CliValues::new());

  let summary = run(
    &descriptors(&NAMES),
    &initializers,
    &init_ctx,
    &build_ctx,
    &opts(&temp, true, 2),
  )
  .await
  .unwrap();

  assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
  assert!(summary.artifacts.iter().all(|a| a.verified && a.exported.len() == 2));
  for probe in probes {
    assert_eq!(probe.verifies.load(Ordering::SeqCst), 1);
  }
  assert!(Path::new(&temp.path().join("dist/a.bin.sha256")).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn nothing_starts_after_the_first_failure() {
  const NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

  let temp = TempDir::new().unwrap();
  let gauge = Arc::new(Gauge::default());
  let (_, build_ctx) = contexts(&temp, CliValues::new());
  let mut artifacts = Vec::new();
  let mut probes = Vec::new();
  for name in NAMES {
    let probe = Arc::new(Probe {
      in_flight: Some(gauge.clone()),
      ..Probe::default()
    });
    *probe.fail_verify.lock().unwrap() = true;
    let requested = artifact(&format!("{name}.bin"), &probe);
    build_artifact(&build_ctx, &requested).await.unwrap();
    artifacts.push(requested);
    probes.push(probe);
  }

  let err = export_and_verify(&artifacts, &build_ctx, &opts(&temp, true, 1)).await.unwrap_err();
  assert!(matches!(err, PipelineError::Verify { .. }));

  // Every verify fails, so the first one to run must also be the last.
  let verifies: usize = probes.iter().map(|p| p.verifies.load(Ordering::SeqCst)).sum();
  assert_eq!(verifies, 1);
}
