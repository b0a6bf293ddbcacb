// homeworks/src/web/handlers/module_handlers.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::audit::{NewAuditEntry, MODULE_DELETED};
use crate::models::otp::OtpPurpose;
use crate::models::role::Role;
use crate::services::otp_service::verify_otp;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct CreateModulePayload {
  pub name: String,
}

#[derive(Deserialize)]
pub struct SaveVersionPayload {
  pub content: serde_json::Value,
}

#[derive(Deserialize)]
pub struct DeleteModulePayload {
  pub code: String,
}

#[instrument(name = "handler::create_module", skip_all)]
pub async fn create_module_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<CreateModulePayload>,
) -> Result<HttpResponse, AppError> {
  auth_user.require_any(&[Role::Admin, Role::Ceo])?;
  let name = payload.name.trim();
  if name.is_empty() {
    return Err(AppError::Validation("Module name is required.".to_string()));
  }
  let module = app_state.store.create_module(name).await?;
  Ok(HttpResponse::Created().json(module))
}

/// Deleting a module needs the CEO and a fresh sensitive-action code sent to the CEO phone.
#[instrument(name = "handler::delete_module", skip_all, fields(%module_id))]
pub async fn delete_module_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  module_id: web::Path<Uuid>,
  payload: web::Json<DeleteModulePayload>,
) -> Result<HttpResponse, AppError> {
  auth_user.require_any(&[Role::Ceo])?;
  let module_id = module_id.into_inner();
  let ceo_phone = app_state
    .config
    .ceo_phone
    .clone()
    .ok_or_else(|| AppError::Config("CEO_PHONE is not configured".to_string()))?;

  let module = app_state
    .store
    .find_module(module_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Module {} not found", module_id)))?;
  verify_otp(
    app_state.store.as_ref(),
    &ceo_phone,
    &payload.code,
    OtpPurpose::SensitiveAction,
    Utc::now(),
  )
  .await?;

  if !app_state.store.delete_module(module.id).await? {
    return Err(AppError::NotFound(format!("Module {} not found", module_id)));
  }
  app_state
    .store
    .insert_audit(NewAuditEntry {
      actor_id: auth_user.user.id,
      action: MODULE_DELETED,
      subject_id: Some(module.id),
      detail: json!({ "name": module.name }),
    })
    .await?;
  info!(module = %module.name, "Module deleted.");
  Ok(HttpResponse::NoContent().finish())
}

#[instrument(name = "handler::save_module_version", skip_all, fields(%module_id))]
pub async fn save_module_version_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  module_id: web::Path<Uuid>,
  payload: web::Json<SaveVersionPayload>,
) -> Result<HttpResponse, AppError> {
  auth_user.require_any(&[Role::Admin, Role::Ceo])?;
  let payload = payload.into_inner();
  if !payload.content.is_object() {
    return Err(AppError::Validation("Module content must be a JSON object.".to_string()));
  }
  let version = app_state
    .store
    .save_module_version(module_id.into_inner(), payload.content, auth_user.user.id)
    .await?;
  info!(version = version.version, "Module version saved.");
  Ok(HttpResponse::Created().json(version))
}

#[instrument(name = "handler::list_module_versions", skip_all, fields(%module_id))]
pub async fn list_module_versions_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  module_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  auth_user.require_any(&[Role::Admin, Role::Ceo])?;
  let module_id = module_id.into_inner();
  if app_state.store.find_module(module_id).await?.is_none() {
    return Err(AppError::NotFound(format!("Module {} not found", module_id)));
  }
  let versions = app_state.store.list_module_versions(module_id).await?;
  Ok(HttpResponse::Ok().json(versions))
}
