// flow/tests/flow_execution_tests.rs
mod common;

use common::*;
use haven_flow::{Control, Flow, FlowCtx, Outcome, SkipIf};
use serial_test::serial;
use std::sync::Arc;

#[tokio::test]
#[serial]
async fn runs_steps_in_declared_order() {
  setup_tracing();
  let mut flow = Flow::<TestCtx, TestError>::new(&[("validate", false, None), ("persist", false, None), ("notify", false, None)]);
  flow.on("notify", record("notify"));
  flow.on("validate", record("validate"));
  flow.on("persist", record("persist"));

  let ctx = FlowCtx::new(TestCtx::default());
  let outcome = flow.run(ctx.clone()).await;

  assert_eq!(outcome, Ok(Outcome::Completed));
  let guard = ctx.read();
  assert_eq!(guard.counter, 3);
  assert_eq!(guard.trail, vec!["validate", "persist", "notify"]);
}

#[tokio::test]
#[serial]
async fn before_on_after_run_in_phase_order() {
  setup_tracing();
  let mut flow = Flow::<TestCtx, TestError>::new(&[("only", false, None)]);
  flow.after("only", record("after"));
  flow.on("only", record("on-1"));
  flow.before("only", record("before"));
  flow.on("only", record("on-2"));

  let ctx = FlowCtx::new(TestCtx::default());
  flow.run(ctx.clone()).await.unwrap();

  assert_eq!(ctx.read().trail, vec!["before", "on-1", "on-2", "after"]);
}

#[tokio::test]
#[serial]
async fn halt_stops_remaining_handlers_and_steps() {
  setup_tracing();
  let mut flow = Flow::<TestCtx, TestError>::new(&[("a", false, None), ("b", false, None), ("c", false, None)]);
  flow.on("a", record("a"));
  flow.on("b", record("b"));
  flow.after("b", record("b-after"));
  flow.on("c", record("c"));

  let ctx = FlowCtx::new(TestCtx {
    halt_at: Some("b".to_string()),
    ..Default::default()
  });
  let outcome = flow.run(ctx.clone()).await.unwrap();

  assert_eq!(outcome, Outcome::Halted);
  assert_eq!(ctx.read().trail, vec!["a", "b"]);
}

#[tokio::test]
#[serial]
async fn required_step_error_ends_the_run() {
  setup_tracing();
  let mut flow = Flow::<TestCtx, TestError>::new(&[("ok", false, None), ("broken", false, None), ("never", false, None)]);
  flow.on("ok", record("ok"));
  flow.on("broken", fail("broken", "db down"));
  flow.on("never", record("never"));

  let ctx = FlowCtx::new(TestCtx::default());
  let err = flow.run(ctx.clone()).await.unwrap_err();

  assert_eq!(err, TestError::Handler("db down".to_string()));
  assert_eq!(ctx.read().trail, vec!["ok", "broken"]);
}

#[tokio::test]
#[serial]
async fn optional_step_error_is_swallowed() {
  setup_tracing();
  let mut flow = Flow::<TestCtx, TestError>::new(&[("save", false, None), ("send_mail", true, None), ("respond", false, None)]);
  flow.on("save", record("save"));
  flow.on("send_mail", fail("send_mail", "smtp refused"));
  flow.after("send_mail", record("send_mail-after"));
  flow.on("respond", record("respond"));

  let ctx = FlowCtx::new(TestCtx::default());
  let outcome = flow.run(ctx.clone()).await.unwrap();

  assert_eq!(outcome, Outcome::Completed);
  assert_eq!(ctx.read().trail, vec!["save", "send_mail", "respond"]);
}

#[tokio::test]
#[serial]
async fn missing_handler_on_required_step_is_an_error() {
  setup_tracing();
  let mut flow = Flow::<TestCtx, TestError>::new(&[("first", false, None), ("unwired", false, None)]);
  flow.on("first", record("first"));

  let err = flow.run(FlowCtx::new(TestCtx::default())).await.unwrap_err();
  match err {
    TestError::Flow(msg) => assert!(msg.contains("MissingHandler"), "unexpected: {}", msg),
    other => panic!("expected flow error, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn optional_step_without_handlers_is_skipped() {
  setup_tracing();
  let mut flow = Flow::<TestCtx, TestError>::new(&[("first", false, None), ("extension_point", true, None)]);
  flow.on("first", record("first"));

  let outcome = flow.run(FlowCtx::new(TestCtx::default())).await;
  assert_eq!(outcome, Ok(Outcome::Completed));
}

#[tokio::test]
#[serial]
async fn skip_if_condition_bypasses_step() {
  setup_tracing();
  let skip_when_counted: SkipIf<TestCtx> = Arc::new(|ctx: FlowCtx<TestCtx>| ctx.with(|c| c.counter > 0));
  let mut flow = Flow::<TestCtx, TestError>::new(&[("count", false, None), ("maybe", false, Some(skip_when_counted))]);
  flow.on("count", record("count"));
  flow.on("maybe", record("maybe"));

  let ctx = FlowCtx::new(TestCtx::default());
  flow.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().trail, vec!["count"]);
}

#[tokio::test]
#[serial]
async fn steps_can_be_inserted_and_removed() {
  setup_tracing();
  let mut flow = Flow::<TestCtx, TestError>::new(&[("a", false, None), ("c", false, None)]);
  flow.insert_after("a", "b", false, None);
  flow.insert_before("a", "zero", true, None);
  flow.on("a", record("a"));
  flow.on("b", record("b"));
  flow.on("c", record("c"));
  assert_eq!(flow.step_names(), vec!["zero", "a", "b", "c"]);

  flow.remove_step("c");
  flow.remove_step("not-there");
  assert_eq!(flow.step_names(), vec!["zero", "a", "b"]);

  let ctx = FlowCtx::new(TestCtx::default());
  flow.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().trail, vec!["a", "b"]);
}

#[tokio::test]
#[serial]
async fn set_optional_turns_missing_handler_into_skip() {
  setup_tracing();
  let mut flow = Flow::<TestCtx, TestError>::new(&[("a", false, None)]);
  assert!(flow.run(FlowCtx::new(TestCtx::default())).await.is_err());

  flow.set_optional("a", true);
  assert_eq!(flow.run(FlowCtx::new(TestCtx::default())).await, Ok(Outcome::Completed));
}

#[test]
#[should_panic(expected = "is not defined")]
fn registering_on_unknown_step_panics() {
  let mut flow = Flow::<TestCtx, TestError>::new(&[("a", false, None)]);
  flow.on("typo", |_ctx: FlowCtx<TestCtx>| async { Ok::<_, TestError>(Control::Continue) });
}

#[tokio::test]
#[serial]
async fn handlers_can_be_plain_async_closures() {
  setup_tracing();
  let mut flow = Flow::<TestCtx, TestError>::new(&[("price", false, None)]);
  flow.on("price", |ctx: FlowCtx<TestCtx>| async move {
    let current = ctx.read().counter;
    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    ctx.update(|c| c.counter = current + 41);
    Ok(Control::Continue)
  });

  let ctx = FlowCtx::new(TestCtx {
    counter: 1,
    ..Default::default()
  });
  flow.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.with(|c| c.counter), 42);
}
