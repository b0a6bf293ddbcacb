// stagehand/src/error.rs
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Step '{step_name}' timed out after {after:?}")]
  StepTimeout { step_name: String, after: Duration },

  #[error("Type mismatch during context downcast (expected {expected_type}, step: '{step_name}')")]
  TypeMismatch {
    step_name: String,
    expected_type: String,
  },

  #[error("No pipeline registered for context type {context_type}")]
  PipelineNotRegistered { context_type: String },

  #[error("Internal stagehand error: {0}")]
  Internal(String),
}
