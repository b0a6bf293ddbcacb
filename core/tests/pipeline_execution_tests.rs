// tests/pipeline_execution_tests.rs
mod common;

use common::*;
use serial_test::serial;
use stagehand::{ContextData, FlowError, Pipeline, PipelineControl, PipelineResult};
use std::sync::Arc;

fn chain() -> Pipeline<SignOffCtx, TestError> {
  let mut p = Pipeline::<SignOffCtx, TestError>::new(&[
    ("sales", false, None),
    ("finance", false, None),
    ("ceo", false, None),
  ]);
  p.on_root("sales", sign_off("sales", "sales_manager"));
  p.on_root("finance", sign_off("finance", "finance_manager"));
  p.on_root("ceo", sign_off("ceo", "ceo"));
  p
}

#[tokio::test]
#[serial]
async fn steps_run_in_declared_order() {
  setup_tracing();
  let ctx = ContextData::new(SignOffCtx::default());
  let result = chain().run(ctx.clone()).await;

  assert_eq!(result.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx.read().signed, vec!["sales_manager", "finance_manager", "ceo"]);
}

#[tokio::test]
#[serial]
async fn stop_halts_remaining_steps() {
  setup_tracing();
  let ctx = ContextData::new(SignOffCtx {
    halt_at: Some("finance".to_string()),
    ..Default::default()
  });
  let result = chain().run(ctx.clone()).await;

  assert_eq!(result.unwrap(), PipelineResult::Stopped);
  assert_eq!(ctx.read().signed, vec!["sales_manager", "finance_manager"]);
}

#[tokio::test]
#[serial]
async fn handler_error_is_returned_and_later_steps_do_not_run() {
  setup_tracing();
  let mut p = Pipeline::<SignOffCtx, TestError>::new(&[("sales", false, None), ("ceo", false, None)]);
  p.on_root("sales", failing("sales", "ledger row missing"));
  p.on_root("ceo", sign_off("ceo", "ceo"));

  let ctx = ContextData::new(SignOffCtx::default());
  let err = p.run(ctx.clone()).await.unwrap_err();

  assert_eq!(err, TestError::Handler("ledger row missing".to_string()));
  assert!(ctx.read().signed.is_empty());
}

#[tokio::test]
#[serial]
async fn skip_condition_is_evaluated_against_current_context() {
  setup_tracing();
  let mut p = Pipeline::<SignOffCtx, TestError>::new(&[
    ("sales", false, None),
    (
      "finance",
      false,
      Some(Arc::new(|ctx: ContextData<SignOffCtx>| ctx.read().reserved_amount == 0)),
    ),
    ("ceo", false, None),
  ]);
  p.on_root("sales", sign_off("sales", "sales_manager"));
  p.on_root("finance", sign_off("finance", "finance_manager"));
  p.on_root("ceo", sign_off("ceo", "ceo"));

  let ctx = ContextData::new(SignOffCtx::default());
  p.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().signed, vec!["sales_manager", "ceo"]);
}

#[tokio::test]
#[serial]
async fn non_optional_step_without_handlers_fails() {
  setup_tracing();
  let p = Pipeline::<SignOffCtx, TestError>::new(&[("unwired", false, None)]);
  let err = p.run(ContextData::new(SignOffCtx::default())).await.unwrap_err();
  match err {
    TestError::Flow(s) => {
      assert!(s.contains("HandlerMissing"));
      assert!(s.contains("unwired"));
    }
    other => panic!("expected HandlerMissing, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn optional_step_without_handlers_is_skipped() {
  setup_tracing();
  let p = Pipeline::<SignOffCtx, TestError>::new(&[("notify", true, None)]);
  let result = p.run(ContextData::new(SignOffCtx::default())).await;
  assert_eq!(result.unwrap(), PipelineResult::Completed);
}

#[tokio::test]
#[serial]
async fn before_on_after_run_in_phase_order() {
  setup_tracing();
  let mut p = Pipeline::<SignOffCtx, TestError>::new(&[("ceo", false, None)]);
  p.after_root("ceo", |ctx: ContextData<SignOffCtx>| async move {
    ctx.write().log.push("after".to_string());
    Ok::<_, TestError>(PipelineControl::Continue)
  });
  p.on_root("ceo", sign_off("ceo", "ceo"));
  p.before_root("ceo", |ctx: ContextData<SignOffCtx>| async move {
    ctx.write().log.push("before".to_string());
    Ok::<_, FlowError>(PipelineControl::Continue)
  });

  let ctx = ContextData::new(SignOffCtx::default());
  p.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().log, vec!["before", "on:ceo", "after"]);
}

#[test]
#[should_panic(expected = "not found in pipeline definition")]
fn registering_on_unknown_step_panics() {
  let mut p = Pipeline::<SignOffCtx, TestError>::new(&[("sales", false, None)]);
  p.on_root("typo", sign_off("typo", "x"));
}
