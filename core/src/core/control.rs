// stagehand/src/core/control.rs

//! Flow signals returned by handlers and the outcome of a whole run.

/// Returned by every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineControl {
  /// Run the next handler / step.
  Continue,
  /// Halt the pipeline. No later handler runs and no compensation is triggered.
  Stop,
}

/// Outcome of a run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
  Completed,
  Stopped,
}
