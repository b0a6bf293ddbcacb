// tests/compensation_tests.rs
mod common;

use common::*;
use serial_test::serial;
use stagehand::{ContextData, Pipeline, PipelineControl, PipelineResult};

fn reserving_pipeline() -> Pipeline<SignOffCtx, TestError> {
  let mut p = Pipeline::<SignOffCtx, TestError>::new(&[
    ("sales", false, None),
    ("finance", false, None),
    ("ceo", false, None),
  ]);
  p.on_root("sales", sign_off("sales", "sales"));
  p.compensate_root("sales", undo("sales"));
  p.on_root("finance", sign_off("finance", "finance"));
  p.compensate_root("finance", undo("finance"));
  p
}

#[tokio::test]
#[serial]
async fn finished_steps_are_compensated_newest_first() {
  setup_tracing();
  let mut p = reserving_pipeline();
  p.on_root("ceo", failing("ceo", "ceo unavailable"));
  p.compensate_root("ceo", undo("ceo"));

  let ctx = ContextData::new(SignOffCtx::default());
  let err = p.run(ctx.clone()).await.unwrap_err();

  assert_eq!(err, TestError::Handler("ceo unavailable".to_string()));
  let guard = ctx.read();
  // The failing step itself is not compensated.
  assert_eq!(
    guard.log,
    vec!["on:sales", "on:finance", "fail:ceo", "compensate:finance", "compensate:sales"]
  );
  assert!(guard.signed.is_empty());
}

#[tokio::test]
#[serial]
async fn stop_does_not_trigger_compensation() {
  setup_tracing();
  let mut p = reserving_pipeline();
  p.on_root("ceo", sign_off("ceo", "ceo"));

  let ctx = ContextData::new(SignOffCtx {
    halt_at: Some("finance".to_string()),
    ..Default::default()
  });
  assert_eq!(p.run(ctx.clone()).await.unwrap(), PipelineResult::Stopped);
  assert_eq!(ctx.read().signed, vec!["sales", "finance"]);
}

#[tokio::test]
#[serial]
async fn failing_compensation_does_not_block_earlier_ones() {
  setup_tracing();
  let mut p = Pipeline::<SignOffCtx, TestError>::new(&[
    ("sales", false, None),
    ("finance", false, None),
    ("ceo", false, None),
  ]);
  p.on_root("sales", sign_off("sales", "sales"));
  p.compensate_root("sales", undo("sales"));
  p.on_root("finance", sign_off("finance", "finance"));
  p.compensate_root("finance", |_ctx: ContextData<SignOffCtx>| async move {
    Err::<PipelineControl, _>(TestError::Handler("rollback failed".to_string()))
  });
  p.on_root("ceo", failing("ceo", "boom"));

  let ctx = ContextData::new(SignOffCtx::default());
  let err = p.run(ctx.clone()).await.unwrap_err();

  assert_eq!(err, TestError::Handler("boom".to_string()));
  let guard = ctx.read();
  assert_eq!(guard.log.last().map(String::as_str), Some("compensate:sales"));
  assert_eq!(guard.signed, vec!["finance"]);
}
