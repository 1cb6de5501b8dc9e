//! Instrumented artifacts for driving the pipeline.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use shipyard_lib::argument::State;
use shipyard_lib::artifact::{Artifact, ArtifactError, ArtifactHandler, ArtifactType, BuildOpts};
use shipyard_lib::engine::{Builder, Engine};
use shipyard_lib::pipeline::BuildContext;
use shipyard_lib::store::{ArtifactStore, MapStore};
use tempfile::TempDir;

/// Shared counters and hooks for one test artifact.
#[derive(Default)]
pub struct Probe {
  pub builds: AtomicUsize,
  pub verifies: AtomicUsize,
  pub deps: Mutex<Vec<Arc<Artifact>>>,
  /// Artifacts that must not be stored yet when this one builds.
  pub absent: Mutex<Vec<Arc<Artifact>>>,
  pub delay: Mutex<Option<Duration>>,
  pub fail_verify: Mutex<bool>,
  /// Tracks concurrent verifications across probes sharing it.
  pub in_flight: Option<Arc<Gauge>>,
}

/// Current and peak concurrency.
#[derive(Default)]
pub struct Gauge {
  current: AtomicUsize,
  pub peak: AtomicUsize,
}

impl Gauge {
  fn enter(&self) {
    let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);
  }

  fn exit(&self) {
    self.current.fetch_sub(1, Ordering::SeqCst);
  }
}

pub struct Recorder {
  pub filename: String,
  pub probe: Arc<Probe>,
}

#[async_trait]
impl ArtifactHandler for Recorder {
  fn filename(&self) -> Result<String, ArtifactError> {
    Ok(self.filename.clone())
  }

  async fn dependencies(&self) -> Result<Vec<Arc<Artifact>>, ArtifactError> {
    Ok(self.probe.deps.lock().unwrap().clone())
  }

  async fn builder(&self, opts: &BuildOpts<'_>) -> Result<Builder, ArtifactError> {
    let mut builder = Builder::new(self.filename.replace('/', "-"));
    let deps = self.probe.deps.lock().unwrap().clone();
    for dep in deps {
      let path = opts.store.file(&dep).await?;
      builder = builder.with_input(dep.filename()?, path);
    }
    Ok(builder)
  }

  async fn build_file(&self, builder: &Builder, opts: &BuildOpts<'_>) -> Result<PathBuf, ArtifactError> {
    let absent = self.probe.absent.lock().unwrap().clone();
    for other in absent {
      assert!(
        !opts.store.exists(&other).await?,
        "{} was stored before its dependency {}",
        other.descriptor,
        self.filename
      );
    }

    let delay = *self.probe.delay.lock().unwrap();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }

    self.probe.builds.fetch_add(1, Ordering::SeqCst);
    let out = opts.engine.output_dir(builder).await?;
    let path = out.join("payload");
    let mut contents = format!("built {}\n", self.filename);
    for (name, input) in &builder.inputs {
      contents.push_str(&format!("{name}: {}\n", std::fs::read_to_string(input)?.lines().count()));
    }
    tokio::fs::write(&path, contents).await?;
    Ok(path)
  }

  async fn verify_file(&self, _engine: &Engine, file: &Path) -> Result<(), ArtifactError> {
    if let Some(gauge) = &self.probe.in_flight {
      gauge.enter();
      tokio::time::sleep(Duration::from_millis(20)).await;
      gauge.exit();
    }
    self.probe.verifies.fetch_add(1, Ordering::SeqCst);
    if *self.probe.fail_verify.lock().unwrap() {
      return Err(ArtifactError::Verification(format!("{} rejected", file.display())));
    }
    Ok(())
  }
}

pub fn artifact(filename: &str, probe: &Arc<Probe>) -> Arc<Artifact> {
  Arc::new(Artifact {
    descriptor: format!("test:{filename}"),
    artifact_type: ArtifactType::File,
    flags: vec![],
    handler: Box::new(Recorder {
      filename: filename.to_string(),
      probe: probe.clone(),
    }),
  })
}

/// A build context over a fresh in-memory store and scratch engine.
pub fn build_context(temp: &TempDir) -> (BuildContext, Arc<MapStore>) {
  let store = Arc::new(MapStore::new());
  let ctx = BuildContext::new(
    Arc::new(State::default()),
    store.clone() as Arc<dyn ArtifactStore>,
    Arc::new(Engine::new(temp.path().join("engine"))),
  );
  (ctx, store)
}
