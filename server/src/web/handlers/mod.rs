// homeworks/src/web/handlers/mod.rs

use crate::errors::AppError;
use crate::state::AppState;
use stagehand::{ContextData, PipelineResult};
use tracing::warn;

pub mod auth_handlers;
pub mod integration_handlers;
pub mod module_handlers;
pub mod notification_handlers;
pub mod order_handlers;
pub mod payment_handlers;
pub mod user_handlers;
pub mod whitelist_handlers;

/// Runs the pipeline registered for `T`. Every workflow here is expected to
/// complete; a handler stopping it early is reported as an internal error.
pub(crate) async fn run_pipeline<T>(app_state: &AppState, ctx_data: ContextData<T>, workflow: &str) -> Result<(), AppError>
where
  T: Send + Sync + 'static,
{
  match app_state.registry.run(ctx_data).await? {
    PipelineResult::Completed => Ok(()),
    PipelineResult::Stopped => {
      warn!(%workflow, "Pipeline was stopped by a handler.");
      Err(AppError::Internal(format!("The {} workflow was halted.", workflow)))
    }
  }
}
