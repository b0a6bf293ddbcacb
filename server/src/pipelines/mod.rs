// homeworks/src/pipelines/mod.rs

//! Workflows that touch several tables or external parties run as stagehand
//! pipelines, registered once at startup.

use crate::errors::AppError;
use stagehand::Registry;
use std::sync::Arc;

pub mod contexts;
pub mod common_steps;

pub mod approval_pipeline;
pub mod impersonation_pipeline;
pub mod otp_login_pipeline;
pub mod status_pipeline;

pub fn register_all_pipelines(registry: &Arc<Registry<AppError>>) {
  tracing::info!("Registering pipelines...");

  approval_pipeline::register_approval_pipeline(registry);
  status_pipeline::register_status_pipeline(registry);
  impersonation_pipeline::register_impersonation_pipeline(registry);
  otp_login_pipeline::register_otp_login_pipeline(registry);

  tracing::info!("All application pipelines registered.");
}
