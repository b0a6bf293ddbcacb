// stagehand/src/lib.rs

//! Stagehand: an async step-pipeline engine.
//!
//! A pipeline is an ordered list of named steps run against one shared
//! context. Each step may carry:
//!  - `before`, `on` and `after` handlers, run in that order.
//!  - A skip condition evaluated against the context.
//!  - An optional flag (a handler-less optional step is skipped instead of failing).
//!  - A timeout applied to every handler of the step.
//!  - Compensation handlers, run in reverse step order when a later step fails.
//!
//! Handlers return `PipelineControl::Continue` or `PipelineControl::Stop`.
//! Pipelines are registered in a `Registry` keyed by their context type and
//! run from there by whichever service owns the registry.

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod timeout;

pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::step::{Handler, SkipCondition, StepDef};

pub use crate::pipeline::Pipeline;

pub use crate::error::FlowError;

pub use crate::registry::Registry;

pub use crate::timeout::with_timeout;

/*
    Typical use:
    1. Define a context struct `Ctx` holding the inputs and the slots each step fills in.
    2. `Pipeline::<Ctx, AppError>::new(&[("load", false, None), ("apply", false, None)])`.
    3. Attach handlers with `on_root`, `before_root`, `after_root`; attach rollbacks with
       `compensate_root` and limits with `set_timeout`.
    4. `registry.register_pipeline(pipeline)` once at startup.
    5. Per request: `registry.run(ContextData::new(ctx)).await`, then read the context back.
*/
