// flow/tests/branch_tests.rs
mod common;

use common::*;
use haven_flow::{Control, Flow, FlowCtx, FlowError, Outcome};
use serial_test::serial;
use std::sync::Arc;

fn paid_flow() -> Arc<Flow<PaidEvent, TestError>> {
  let mut flow = Flow::<PaidEvent, TestError>::new(&[("mark_handled", false, None)]);
  flow.on("mark_handled", |ctx: FlowCtx<PaidEvent>| async move {
    ctx.write().handled = true;
    Ok(Control::Continue)
  });
  Arc::new(flow)
}

fn canceled_flow() -> Arc<Flow<CanceledEvent, TestError>> {
  let mut flow = Flow::<CanceledEvent, TestError>::new(&[("stop_here", false, None)]);
  flow.on("stop_here", |_ctx: FlowCtx<CanceledEvent>| async move { Ok(Control::Halt) });
  Arc::new(flow)
}

/// Parent flow with "route" as the branch point followed by a trailing "ack" step.
/// The paid arm shares its sub-context through `slot` so the test can inspect it.
fn routed_flow(slot: Arc<parking_lot::Mutex<Option<FlowCtx<PaidEvent>>>>) -> Flow<TestCtx, TestError> {
  let mut flow = Flow::<TestCtx, TestError>::new(&[("route", false, None), ("ack", false, None)]);
  flow.on("ack", record("ack"));

  flow
    .branch("route")
    .arm("paid", paid_flow(), move |ctx: FlowCtx<TestCtx>| {
      let reference = ctx
        .with(|c| c.payload.clone())
        .ok_or_else(|| FlowError::extract("route", "missing payload"))?;
      let sub = FlowCtx::new(PaidEvent {
        reference,
        handled: false,
      });
      *slot.lock() = Some(sub.clone());
      Ok(sub)
    })
    .when(|ctx| ctx.with(|c| c.event_kind == "paid"))
    .arm("canceled", canceled_flow(), |ctx: FlowCtx<TestCtx>| {
      let reference = ctx.with(|c| c.payload.clone().unwrap_or_default());
      Ok(FlowCtx::new(CanceledEvent { reference }))
    })
    .when(|ctx| ctx.with(|c| c.event_kind == "canceled"))
    .otherwise(Control::Continue)
    .finish(false);

  flow
}

fn event(kind: &str, payload: Option<&str>) -> FlowCtx<TestCtx> {
  FlowCtx::new(TestCtx {
    event_kind: kind.to_string(),
    payload: payload.map(str::to_string),
    ..Default::default()
  })
}

#[tokio::test]
#[serial]
async fn matching_arm_runs_its_sub_flow() {
  setup_tracing();
  let slot = Arc::new(parking_lot::Mutex::new(None));
  let flow = routed_flow(slot.clone());

  let ctx = event("paid", Some("cs_123"));
  let outcome = flow.run(ctx.clone()).await.unwrap();

  assert_eq!(outcome, Outcome::Completed);
  assert_eq!(ctx.read().trail, vec!["ack"]);
  let sub = slot.lock().clone().expect("paid arm should have extracted a context");
  assert!(sub.read().handled);
  assert_eq!(sub.read().reference, "cs_123");
}

#[tokio::test]
#[serial]
async fn halted_sub_flow_halts_the_parent() {
  setup_tracing();
  let flow = routed_flow(Arc::new(parking_lot::Mutex::new(None)));

  let ctx = event("canceled", Some("sub_9"));
  let outcome = flow.run(ctx.clone()).await.unwrap();

  assert_eq!(outcome, Outcome::Halted);
  assert!(ctx.read().trail.is_empty());
}

#[tokio::test]
#[serial]
async fn unmatched_event_falls_through_to_next_step() {
  setup_tracing();
  let flow = routed_flow(Arc::new(parking_lot::Mutex::new(None)));

  let ctx = event("refunded", None);
  let outcome = flow.run(ctx.clone()).await.unwrap();

  assert_eq!(outcome, Outcome::Completed);
  assert_eq!(ctx.read().trail, vec!["ack"]);
}

#[tokio::test]
#[serial]
async fn extractor_failure_surfaces_as_branch_extract_error() {
  setup_tracing();
  let flow = routed_flow(Arc::new(parking_lot::Mutex::new(None)));

  let err = flow.run(event("paid", None)).await.unwrap_err();
  match err {
    TestError::Flow(msg) => {
      assert!(msg.contains("BranchExtract"), "unexpected: {}", msg);
      assert!(msg.contains("route"), "step name missing: {}", msg);
    }
    other => panic!("expected flow error, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn require_match_fails_when_nothing_matches() {
  setup_tracing();
  let mut flow = Flow::<TestCtx, TestError>::new(&[("route", false, None)]);
  flow
    .branch("route")
    .arm("paid", paid_flow(), |_ctx: FlowCtx<TestCtx>| Ok(FlowCtx::new(PaidEvent::default())))
    .when(|ctx| ctx.with(|c| c.event_kind == "paid"))
    .require_match()
    .finish(false);

  let err = flow.run(event("other", None)).await.unwrap_err();
  match err {
    TestError::Flow(msg) => assert!(msg.contains("NoBranchMatched"), "unexpected: {}", msg),
    other => panic!("expected flow error, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn optional_branch_step_swallows_sub_flow_errors() {
  setup_tracing();
  let mut failing = Flow::<PaidEvent, TestError>::new(&[("explode", false, None)]);
  failing.on("explode", |_ctx: FlowCtx<PaidEvent>| async move {
    Err(TestError::Handler("gateway timeout".to_string()))
  });

  let mut flow = Flow::<TestCtx, TestError>::new(&[("route", false, None), ("ack", false, None)]);
  flow.on("ack", record("ack"));
  flow
    .branch("route")
    .arm("paid", Arc::new(failing), |_ctx: FlowCtx<TestCtx>| Ok(FlowCtx::new(PaidEvent::default())))
    .when(|_| true)
    .finish(true);

  let ctx = event("paid", None);
  assert_eq!(flow.run(ctx.clone()).await, Ok(Outcome::Completed));
  assert_eq!(ctx.read().trail, vec!["ack"]);
}
