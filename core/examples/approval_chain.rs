// stagehand/examples/approval_chain.rs
//
// Runs a three-role sign-off chain, then the same chain with a failing
// final step to show compensation unwinding the earlier sign-offs.

use stagehand::{ContextData, FlowError, Pipeline, PipelineControl, PipelineResult};
use tracing::info;

#[derive(Debug, Default)]
struct SignOff {
  signed: Vec<&'static str>,
  ceo_available: bool,
}

fn build() -> Pipeline<SignOff, FlowError> {
  let mut p = Pipeline::<SignOff, FlowError>::new(&[
    ("sales_manager", false, None),
    ("finance_manager", false, None),
    ("ceo", false, None),
  ]);

  for role in ["sales_manager", "finance_manager"] {
    p.on_root(role, move |ctx: ContextData<SignOff>| async move {
      ctx.write().signed.push(role);
      Ok::<_, FlowError>(PipelineControl::Continue)
    });
    p.compensate_root(role, move |ctx: ContextData<SignOff>| async move {
      ctx.write().signed.retain(|r| *r != role);
      info!(role = role, "Sign-off withdrawn.");
      Ok::<_, FlowError>(PipelineControl::Continue)
    });
  }

  p.on_root("ceo", |ctx: ContextData<SignOff>| async move {
    if !ctx.read().ceo_available {
      return Err(FlowError::Internal("ceo sign-off unavailable".to_string()));
    }
    ctx.write().signed.push("ceo");
    Ok(PipelineControl::Continue)
  });
  p
}

#[tokio::main]
async fn main() -> Result<(), FlowError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  let pipeline = build();

  let ok_ctx = ContextData::new(SignOff {
    ceo_available: true,
    ..Default::default()
  });
  let result = pipeline.run(ok_ctx.clone()).await?;
  assert_eq!(result, PipelineResult::Completed);
  info!(signed = ?ok_ctx.read().signed, "Chain completed.");

  let failing_ctx = ContextData::new(SignOff::default());
  let err = pipeline.run(failing_ctx.clone()).await.unwrap_err();
  info!(error = %err, signed = ?failing_ctx.read().signed, "Chain failed and was unwound.");
  assert!(failing_ctx.read().signed.is_empty());

  Ok(())
}
