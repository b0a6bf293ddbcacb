// stagehand/src/pipeline/execution.rs

//! `Pipeline::run()`: walks the steps, applies skip conditions and timeouts,
//! and compensates finished steps when one fails.

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::core::step::{Handler, StepDef};
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;
use crate::timeout::with_timeout;
use tracing::{event, instrument, span, Instrument, Level};

enum StepOutcome {
  Skipped,
  Finished,
  Stopped,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step against `ctx_data`.
  ///
  /// `Ok(Stopped)` means a handler returned `PipelineControl::Stop`.
  /// On `Err`, compensation handlers of all steps that had finished have already run.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      context_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    event!(Level::DEBUG, "Pipeline execution starting.");
    let mut finished: Vec<&str> = Vec::new();

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_span = span!(
        Level::INFO,
        "pipeline_step",
        step_name = step_def.name.as_str(),
        step_index = step_idx,
        optional = step_def.optional
      );

      match self.run_step(step_def, &ctx_data).instrument(step_span).await {
        Ok(StepOutcome::Skipped) => {}
        Ok(StepOutcome::Finished) => finished.push(step_def.name.as_str()),
        Ok(StepOutcome::Stopped) => return Ok(PipelineResult::Stopped),
        Err(e) => {
          event!(Level::WARN, step_name = %step_def.name, error = %e, finished_steps = finished.len(), "Step failed.");
          self.compensate_finished(&finished, &ctx_data).await;
          return Err(e);
        }
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed.");
    Ok(PipelineResult::Completed)
  }

  async fn run_step(&self, step_def: &StepDef<TData>, ctx_data: &ContextData<TData>) -> Result<StepOutcome, Err> {
    let step_name = step_def.name.as_str();

    if let Some(skip_if) = &step_def.skip_if {
      if skip_if(ctx_data.clone()) {
        event!(Level::INFO, "Step skipped by its skip condition.");
        return Ok(StepOutcome::Skipped);
      }
    }

    let phases = [
      ("before", self.before.get(step_name)),
      ("on", self.on.get(step_name)),
      ("after", self.after.get(step_name)),
    ];
    let has_any = phases.iter().any(|(_, hs)| hs.map_or(false, |v| !v.is_empty()));
    if !has_any {
      if step_def.optional {
        event!(Level::DEBUG, "Optional step has no handlers, skipping.");
        return Ok(StepOutcome::Skipped);
      }
      event!(Level::ERROR, "Non-optional step has no handlers.");
      return Err(Err::from(FlowError::HandlerMissing {
        step_name: step_def.name.clone(),
      }));
    }

    for (phase, handlers) in phases {
      let Some(handlers) = handlers else { continue };
      for (handler_idx, handler_fn) in handlers.iter().enumerate() {
        let handler_span = span!(Level::DEBUG, "handler", phase = phase, handler_index = handler_idx);
        let control = self
          .call_handler(step_def, handler_fn, ctx_data)
          .instrument(handler_span)
          .await?;
        if control == PipelineControl::Stop {
          event!(Level::INFO, phase = phase, "Pipeline stopped by a handler.");
          return Ok(StepOutcome::Stopped);
        }
      }
    }

    event!(Level::DEBUG, "Step finished.");
    Ok(StepOutcome::Finished)
  }

  async fn call_handler(
    &self,
    step_def: &StepDef<TData>,
    handler_fn: &Handler<TData, Err>,
    ctx_data: &ContextData<TData>,
  ) -> Result<PipelineControl, Err> {
    let fut = handler_fn(ctx_data.clone());
    match step_def.timeout {
      None => fut.await,
      Some(limit) => match with_timeout(limit, fut).await {
        Some(result) => result,
        None => Err(Err::from(FlowError::StepTimeout {
          step_name: step_def.name.clone(),
          after: limit,
        })),
      },
    }
  }

  async fn compensate_finished(&self, finished: &[&str], ctx_data: &ContextData<TData>) {
    for step_name in finished.iter().rev() {
      let Some(handlers) = self.compensate.get(*step_name) else { continue };
      for handler_fn in handlers {
        match handler_fn(ctx_data.clone()).await {
          Ok(_) => event!(Level::INFO, %step_name, "Compensation applied."),
          Err(e) => event!(Level::ERROR, %step_name, error = %e, "Compensation failed; continuing with earlier steps."),
        }
      }
    }
  }
}
