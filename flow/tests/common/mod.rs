// flow/tests/common/mod.rs
#![allow(dead_code)]

use haven_flow::{Control, FlowCtx, FlowError, Handler};
use once_cell::sync::Lazy;
use tracing::Level;

#[derive(Clone, Debug, Default)]
pub struct TestCtx {
  pub counter: i32,
  pub trail: Vec<String>,
  pub halt_at: Option<String>,
  pub event_kind: String,
  pub payload: Option<String>,
}

/// Sub-context used by branch tests.
#[derive(Clone, Debug, Default)]
pub struct PaidEvent {
  pub reference: String,
  pub handled: bool,
}

#[derive(Clone, Debug, Default)]
pub struct CanceledEvent {
  pub reference: String,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("flow error: {0}")]
  Flow(String),

  #[error("handler failed: {0}")]
  Handler(String),
}

impl From<FlowError> for TestError {
  fn from(err: FlowError) -> Self {
    TestError::Flow(format!("{:?}", err))
  }
}

/// Appends `label` to the trail and bumps the counter. Halts when `halt_at` names this label.
pub fn record(label: &'static str) -> Handler<TestCtx, TestError> {
  Box::new(move |ctx: FlowCtx<TestCtx>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.counter += 1;
      guard.trail.push(label.to_string());
      tracing::debug!(target: "flow_tests", label, counter = guard.counter, "handler ran");
      if guard.halt_at.as_deref() == Some(label) {
        return Ok(Control::Halt);
      }
      Ok(Control::Continue)
    })
  })
}

pub fn fail(label: &'static str, message: &'static str) -> Handler<TestCtx, TestError> {
  Box::new(move |ctx: FlowCtx<TestCtx>| {
    Box::pin(async move {
      ctx.write().trail.push(label.to_string());
      Err(TestError::Handler(message.to_string()))
    })
  })
}

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
