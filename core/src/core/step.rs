// stagehand/src/core/step.rs

//! Step definitions and the boxed handler type.

use super::{ContextData, PipelineControl};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// A step handler. Takes a clone of the shared context, returns a boxed future.
///
/// Handlers must drop any lock guard before awaiting.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>
    + Send
    + Sync,
>;

/// Evaluated before a step; `true` skips it.
pub type SkipCondition<TData> = Arc<dyn Fn(ContextData<TData>) -> bool + Send + Sync + 'static>;

#[derive(Clone)]
pub struct StepDef<T: 'static + Send + Sync> {
  pub name: String,
  pub optional: bool,
  pub skip_if: Option<SkipCondition<T>>,
  /// Applied to each handler of the step individually.
  pub timeout: Option<Duration>,
}

impl<T: 'static + Send + Sync> StepDef<T> {
  pub fn new(name: impl Into<String>, optional: bool, skip_if: Option<SkipCondition<T>>) -> Self {
    Self {
      name: name.into(),
      optional,
      skip_if,
      timeout: None,
    }
  }
}

impl<T: 'static + Send + Sync> std::fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("optional", &self.optional)
      .field("skip_if_present", &self.skip_if.is_some())
      .field("timeout", &self.timeout)
      .finish()
  }
}
