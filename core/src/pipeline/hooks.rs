// stagehand/src/pipeline/hooks.rs

//! Handler registration: `before`, `on`, `after` and `compensate` phases.

use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use crate::core::step::Handler;
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;
use std::future::Future;
use tracing::{event, Level};

#[derive(Debug, Clone, Copy)]
enum Phase {
  Before,
  On,
  After,
  Compensate,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn push_handler<F, UserErr>(
    &mut self,
    phase: Phase,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name);
    let boxed: Handler<TData, Err> = Box::new(move |ctx_data| {
      let user_fut = handler_fn(ctx_data);
      Box::pin(async move { user_fut.await.map_err(Into::into) })
    });
    let slot = match phase {
      Phase::Before => &mut self.before,
      Phase::On => &mut self.on,
      Phase::After => &mut self.after,
      Phase::Compensate => &mut self.compensate,
    };
    slot.entry(step_name.to_string()).or_default().push(boxed);
    event!(Level::TRACE, %step_name, ?phase, "Handler registered.");
  }

  /// Registers a handler run before the step's `on` handlers.
  ///
  /// The handler's own error type only needs to convert into the pipeline's `Err`.
  pub fn before_root<F, UserErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.push_handler(Phase::Before, step_name, handler_fn);
  }

  /// Registers the main handler of a step.
  pub fn on_root<F, UserErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.push_handler(Phase::On, step_name, handler_fn);
  }

  pub fn after_root<F, UserErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.push_handler(Phase::After, step_name, handler_fn);
  }

  /// Registers a rollback for `step_name`.
  ///
  /// When a later step fails, compensations of every step that finished are run
  /// newest-first. A failing compensation is logged and the remaining ones still run;
  /// the run returns the original error. The control value a compensation returns is ignored.
  pub fn compensate_root<F, UserErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.push_handler(Phase::Compensate, step_name, handler_fn);
  }
}
