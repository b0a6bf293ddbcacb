// tests/common/mod.rs
#![allow(dead_code)]

use stagehand::{ContextData, FlowError, PipelineControl};
use tracing::Level;

/// A toy sign-off context: each step records the role that signed.
#[derive(Clone, Debug, Default)]
pub struct SignOffCtx {
  pub signed: Vec<String>,
  pub log: Vec<String>,
  pub reserved_amount: i64,
  pub halt_at: Option<String>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("flow error: {0}")]
  Flow(String),

  #[error("handler failed: {0}")]
  Handler(String),
}

impl From<FlowError> for TestError {
  fn from(e: FlowError) -> Self {
    TestError::Flow(format!("{:?}", e))
  }
}

/// Appends `role` to `signed`; stops the run if `halt_at` names this step.
pub fn sign_off(step: &'static str, role: &'static str) -> stagehand::Handler<SignOffCtx, TestError> {
  Box::new(move |ctx: ContextData<SignOffCtx>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.signed.push(role.to_string());
      guard.log.push(format!("on:{}", step));
      if guard.halt_at.as_deref() == Some(step) {
        return Ok(PipelineControl::Stop);
      }
      Ok(PipelineControl::Continue)
    })
  })
}

pub fn failing(step: &'static str, message: &'static str) -> stagehand::Handler<SignOffCtx, TestError> {
  Box::new(move |ctx: ContextData<SignOffCtx>| {
    Box::pin(async move {
      ctx.write().log.push(format!("fail:{}", step));
      Err(TestError::Handler(message.to_string()))
    })
  })
}

/// Records `compensate:<step>` in the log.
pub fn undo(step: &'static str) -> stagehand::Handler<SignOffCtx, TestError> {
  Box::new(move |ctx: ContextData<SignOffCtx>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.log.push(format!("compensate:{}", step));
      guard.signed.retain(|r| r != step);
      Ok(PipelineControl::Continue)
    })
  })
}

use once_cell::sync::Lazy;
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
