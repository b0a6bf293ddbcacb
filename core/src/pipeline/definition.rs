// stagehand/src/pipeline/definition.rs

//! `Pipeline<TData, Err>`: step order, handler slots and per-step timeouts.

use crate::core::step::{Handler, SkipCondition, StepDef};
use crate::error::FlowError;
use std::collections::HashMap;
use std::time::Duration;

/// An ordered set of named steps over a shared context `TData`.
///
/// `Err` is what handlers return. It must be `From<FlowError>` so that
/// engine failures (missing handler, step timeout) surface in the same type.
pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<TData>>,

  pub(crate) before: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) after: HashMap<String, Vec<Handler<TData, Err>>>,

  // Rollbacks, keyed by the step whose effects they undo.
  pub(crate) compensate: HashMap<String, Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Creates a pipeline from `(name, optional, skip_if)` triples.
  pub fn new(step_defs: &[(&str, bool, Option<SkipCondition<TData>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(name, optional, skip_if)| StepDef::new(*name, *optional, skip_if.clone()))
      .collect();

    Self {
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
      compensate: HashMap::new(),
    }
  }

  /// Step names in execution order.
  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  fn position(&self, step_name: &str) -> Option<usize> {
    self.steps.iter().position(|s| s.name == step_name)
  }

  /// Panics on an unknown step name. A typo here is a wiring bug, not a runtime condition.
  pub(crate) fn ensure_step_exists(&self, step_name: &str) -> usize {
    match self.position(step_name) {
      Some(idx) => idx,
      None => panic!("Stagehand setup error: Step '{}' not found in pipeline definition.", step_name),
    }
  }

  /// Bounds every handler of `step_name`. Exceeding it fails the run with
  /// `FlowError::StepTimeout` (and triggers compensation of earlier steps).
  pub fn set_timeout(&mut self, step_name: &str, limit: Duration) {
    let idx = self.ensure_step_exists(step_name);
    self.steps[idx].timeout = Some(limit);
  }
}
