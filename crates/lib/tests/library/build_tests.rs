//! Dependency-first, at-most-once building.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use shipyard_lib::pipeline::{PipelineError, build_artifact};
use shipyard_lib::store::ArtifactStore;
use tempfile::TempDir;

use crate::common::{Probe, artifact, build_context};

#[tokio::test]
async fn shared_dependency_builds_once() {
  let temp = TempDir::new().unwrap();
  let (ctx, store) = build_context(&temp);

  let tarball_probe = Arc::new(Probe::default());
  let tarball = artifact("grafana.tar.gz", &tarball_probe);

  let deb_probe = Arc::new(Probe::default());
  deb_probe.deps.lock().unwrap().push(tarball.clone());
  let deb = artifact("grafana.deb", &deb_probe);

  let rpm_probe = Arc::new(Probe::default());
  rpm_probe.deps.lock().unwrap().push(tarball.clone());
  let rpm = artifact("grafana.rpm", &rpm_probe);

  build_artifact(&ctx, &deb).await.unwrap();
  build_artifact(&ctx, &rpm).await.unwrap();
  build_artifact(&ctx, &deb).await.unwrap();

  assert_eq!(tarball_probe.builds.load(Ordering::SeqCst), 1);
  assert_eq!(deb_probe.builds.load(Ordering::SeqCst), 1);
  assert_eq!(rpm_probe.builds.load(Ordering::SeqCst), 1);
  assert!(store.exists(&tarball).await.unwrap());
}

#[tokio::test]
async fn same_filename_is_one_build() {
  let temp = TempDir::new().unwrap();
  let (ctx, _store) = build_context(&temp);

  let probe = Arc::new(Probe::default());
  let first = artifact("bin/grafana_linux-amd64", &probe);
  let second = artifact("bin/grafana_linux-amd64", &probe);

  build_artifact(&ctx, &first).await.unwrap();
  build_artifact(&ctx, &second).await.unwrap();
  assert_eq!(probe.builds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dependency_is_stored_before_dependent_builds() {
  let temp = TempDir::new().unwrap();
  let (ctx, store) = build_context(&temp);

  let backend_probe = Arc::new(Probe::default());
  let backend = artifact("backend", &backend_probe);

  let archive_probe = Arc::new(Probe::default());
  archive_probe.deps.lock().unwrap().push(backend.clone());
  let archive = artifact("archive.tar.gz", &archive_probe);

  // While the backend builds, the archive's slot must still be empty.
  backend_probe.absent.lock().unwrap().push(archive.clone());

  build_artifact(&ctx, &archive).await.unwrap();

  let payload = std::fs::read_to_string(store.file(&archive).await.unwrap()).unwrap();
  assert!(payload.contains("backend: 1"), "{payload}");
}

#[tokio::test]
async fn cycles_are_reported_with_their_chain() {
  let temp = TempDir::new().unwrap();
  let (ctx, _store) = build_context(&temp);

  let a_probe = Arc::new(Probe::default());
  let b_probe = Arc::new(Probe::default());
  let a = artifact("a", &a_probe);
  let b = artifact("b", &b_probe);
  a_probe.deps.lock().unwrap().push(b.clone());
  b_probe.deps.lock().unwrap().push(a.clone());

  let result = tokio::time::timeout(Duration::from_secs(5), build_artifact(&ctx, &a))
    .await
    .expect("cycle detection must not hang");

  match result {
    Err(PipelineError::DependencyCycle { chain }) => assert_eq!(chain, vec!["a", "b", "a"]),
    other => panic!("expected a dependency cycle, got {other:?}"),
  }
  assert_eq!(a_probe.builds.load(Ordering::SeqCst), 0);
  assert_eq!(b_probe.builds.load(Ordering::SeqCst), 0);

  // Break the cycle and clear the probes so the Arcs can drop.
  a_probe.deps.lock().unwrap().clear();
  b_probe.deps.lock().unwrap().clear();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_share_one_build() {
  let temp = TempDir::new().unwrap();
  let (ctx, _store) = build_context(&temp);

  let probe = Arc::new(Probe::default());
  *probe.delay.lock().unwrap() = Some(Duration::from_millis(50));
  let frontend = artifact("public/grafana", &probe);

  let mut tasks = tokio::task::JoinSet::new();
  for _ in 0..8 {
    let ctx = ctx.clone();
    let frontend = frontend.clone();
    tasks.spawn(async move { build_artifact(&ctx, &frontend).await });
  }
  while let Some(result) = tasks.join_next().await {
    result.unwrap().unwrap();
  }

  assert_eq!(probe.builds.load(Ordering::SeqCst), 1);
}
