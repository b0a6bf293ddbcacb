// homeworks/src/web/handlers/whitelist_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::models::role::Role;
use crate::models::whitelist::NewWhitelistEntry;
use crate::services::phone::parse_phone;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct AddWhitelistPayload {
  pub phone: String,
  pub allowed_roles: Vec<String>,
  pub notes: Option<String>,
}

#[instrument(name = "handler::list_whitelist", skip_all)]
pub async fn list_whitelist_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  auth_user.require_any(&[Role::Admin])?;
  let entries = app_state.store.list_whitelist().await?;
  Ok(HttpResponse::Ok().json(json!({ "items": entries })))
}

#[instrument(name = "handler::add_whitelist_entry", skip_all)]
pub async fn add_whitelist_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<AddWhitelistPayload>,
) -> Result<HttpResponse, AppError> {
  auth_user.require_any(&[Role::Admin])?;
  let payload = payload.into_inner();
  let phone = parse_phone(&payload.phone)?;

  let mut allowed_roles: Vec<String> = payload
    .allowed_roles
    .iter()
    .map(|tag| tag.trim().to_lowercase())
    .filter(|tag| !tag.is_empty())
    .collect();
  allowed_roles.sort();
  allowed_roles.dedup();
  if allowed_roles.is_empty() {
    return Err(AppError::Validation("At least one role is required.".to_string()));
  }

  let entry = app_state
    .store
    .upsert_whitelist(NewWhitelistEntry {
      phone,
      allowed_roles,
      notes: payload.notes,
    })
    .await?;
  info!(phone = %entry.phone, roles = ?entry.allowed_roles, "Whitelist entry saved.");
  Ok(HttpResponse::Created().json(entry))
}

#[instrument(name = "handler::remove_whitelist_entry", skip_all)]
pub async fn remove_whitelist_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  phone: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  auth_user.require_any(&[Role::Admin])?;
  let phone = parse_phone(&phone)?;
  if !app_state.store.delete_whitelist(&phone).await? {
    return Err(AppError::NotFound(format!("{} is not whitelisted", phone)));
  }
  Ok(HttpResponse::NoContent().finish())
}

/// Public: tells the registration screen which roles a number may sign up as.
#[instrument(name = "handler::check_staff_whitelist", skip_all)]
pub async fn check_whitelist_handler(
  app_state: web::Data<AppState>,
  phone: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let phone = parse_phone(&phone)?;
  let entry = app_state.store.find_whitelist(&phone).await?;
  Ok(HttpResponse::Ok().json(json!({
    "phone": phone,
    "whitelisted": entry.is_some(),
    "allowed_roles": entry.map(|e| e.allowed_roles),
  })))
}
