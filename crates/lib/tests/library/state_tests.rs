//! Argument resolution through a shared state.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use shipyard_lib::argument::{Argument, ArgumentType, ArgumentValue, State, StateError, ValueFunc};

struct SlowCounter(Arc<AtomicUsize>);

#[async_trait]
impl ValueFunc for SlowCounter {
  async fn value(&self, _state: &State) -> anyhow::Result<ArgumentValue> {
    tokio::time::sleep(Duration::from_millis(30)).await;
    let n = self.0.fetch_add(1, Ordering::SeqCst);
    Ok(ArgumentValue::String(format!("clone-{n}")))
  }
}

fn repository(counter: &Arc<AtomicUsize>) -> Arc<Argument> {
  Arc::new(Argument {
    name: "enterprise-dir",
    description: "Checkout of the enterprise repository",
    argument_type: ArgumentType::String,
    value_func: Some(Arc::new(SlowCounter(counter.clone()))),
    flags: vec![],
    requires: vec![],
  })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_access_resolves_once() {
  let counter = Arc::new(AtomicUsize::new(0));
  let argument = repository(&counter);
  let state = Arc::new(State::default());

  let mut tasks = tokio::task::JoinSet::new();
  for _ in 0..16 {
    let state = state.clone();
    let argument = argument.clone();
    tasks.spawn(async move { state.string(&argument).await });
  }

  while let Some(result) = tasks.join_next().await {
    assert_eq!(result.unwrap().unwrap(), "clone-0");
  }
  assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn resolved_string_read_as_int_is_a_type_error() {
  let counter = Arc::new(AtomicUsize::new(0));
  let argument = repository(&counter);
  let state = State::default();

  state.string(&argument).await.unwrap();
  let err = state.int64(&argument).await.unwrap_err();
  assert!(matches!(
    err,
    StateError::UnexpectedType {
      expected: ArgumentType::Int64,
      actual: ArgumentType::String,
      ..
    }
  ));
  assert_eq!(counter.load(Ordering::SeqCst), 1);
}
