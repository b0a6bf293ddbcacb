// homeworks/src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use super::run_pipeline;
use crate::errors::AppError;
use crate::models::otp::OtpPurpose;
use crate::pipelines::contexts::{ImpersonationCtxData, OtpLoginCtxData};
use crate::services::auth_service::refresh_session;
use crate::services::otp_service::send_otp;
use crate::state::AppState;
use crate::web::extractors::{bearer_token, AuthenticatedUser};
use stagehand::ContextData;

#[derive(Deserialize, Debug)]
pub struct SendOtpPayload {
  pub phone: String,
  #[serde(default = "default_purpose")]
  pub purpose: OtpPurpose,
}

#[derive(Deserialize, Debug)]
pub struct VerifyOtpPayload {
  pub phone: String,
  pub code: String,
  #[serde(default = "default_purpose")]
  pub purpose: OtpPurpose,
  pub full_name: Option<String>,
}

#[derive(Deserialize)]
pub struct RefreshPayload {
  pub refresh_token: String,
}

#[derive(Deserialize, Debug)]
pub struct LoginAsUserPayload {
  pub target_user_id: Uuid,
}

fn default_purpose() -> OtpPurpose {
  OtpPurpose::Login
}

#[instrument(name = "handler::send_otp", skip_all, fields(purpose = %payload.purpose))]
pub async fn send_otp_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<SendOtpPayload>,
) -> Result<HttpResponse, AppError> {
  let now = Utc::now();
  let dispatch = send_otp(
    app_state.store.as_ref(),
    app_state.sms.as_ref(),
    &app_state.config,
    &payload.phone,
    payload.purpose,
    now,
  )
  .await?;
  Ok(HttpResponse::Ok().json(json!({
    "phone": dispatch.phone,
    "expires_at": dispatch.expires_at,
    "expires_in": (dispatch.expires_at - now).num_seconds(),
  })))
}

/// Login codes only. Sensitive-action codes are checked by the action they unlock.
#[instrument(name = "handler::verify_otp", skip_all, fields(purpose = %payload.purpose))]
pub async fn verify_otp_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<VerifyOtpPayload>,
) -> Result<HttpResponse, AppError> {
  if payload.purpose != OtpPurpose::Login {
    return Err(AppError::Validation(
      "Only login codes can be verified here; submit sensitive-action codes with the action itself.".to_string(),
    ));
  }
  let payload = payload.into_inner();
  let ctx_data = ContextData::new(OtpLoginCtxData::new(
    app_state.get_ref().clone(),
    payload.phone,
    payload.code,
    payload.full_name,
    Utc::now(),
  ));
  run_pipeline(&app_state, ctx_data.clone(), "otp_login").await?;

  let guard = ctx_data.read();
  let user = guard
    .user
    .clone()
    .ok_or_else(|| AppError::Internal("Login completed without a user.".to_string()))?;
  let tokens = guard
    .tokens
    .clone()
    .ok_or_else(|| AppError::Internal("Login completed without session tokens.".to_string()))?;
  info!(user_id = %user.id, registered = guard.registered, "User signed in.");
  Ok(HttpResponse::Ok().json(json!({
    "user": user,
    "roles": guard.roles,
    "primary_role": guard.roles.primary().map(|r| r.as_str().to_string()),
    "registered": guard.registered,
    "access_token": tokens.access_token,
    "refresh_token": tokens.refresh_token,
    "expires_at": tokens.expires_at,
  })))
}

#[instrument(name = "handler::login_as_user", skip_all, fields(target_user_id = %payload.target_user_id))]
pub async fn login_as_user_handler(
  req: HttpRequest,
  app_state: web::Data<AppState>,
  payload: web::Json<LoginAsUserPayload>,
) -> Result<HttpResponse, AppError> {
  let caller_token = bearer_token(&req).unwrap_or_default();
  let ctx_data = ContextData::new(ImpersonationCtxData::new(
    app_state.get_ref().clone(),
    caller_token,
    payload.target_user_id,
    Utc::now(),
  ));
  run_pipeline(&app_state, ctx_data.clone(), "login_as_user").await?;

  let tokens = ctx_data
    .read()
    .tokens
    .clone()
    .ok_or_else(|| AppError::Internal("Impersonation completed without session tokens.".to_string()))?;
  Ok(HttpResponse::Ok().json(json!({
    "access_token": tokens.access_token,
    "refresh_token": tokens.refresh_token,
    "expires_at": tokens.expires_at,
    "target_user_id": tokens.user_id,
  })))
}

#[instrument(name = "handler::refresh", skip_all)]
pub async fn refresh_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<RefreshPayload>,
) -> Result<HttpResponse, AppError> {
  let tokens = refresh_session(
    app_state.store.as_ref(),
    &app_state.config,
    &payload.refresh_token,
    Utc::now(),
  )
  .await?;
  Ok(HttpResponse::Ok().json(json!({
    "access_token": tokens.access_token,
    "refresh_token": tokens.refresh_token,
    "expires_at": tokens.expires_at,
    "user_id": tokens.user_id,
  })))
}

/// Revokes the caller's session. Ending an impersonation this way leaves the
/// administrator's own session signed in.
#[instrument(name = "handler::logout", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn logout_handler(app_state: web::Data<AppState>, auth_user: AuthenticatedUser) -> Result<HttpResponse, AppError> {
  app_state.store.revoke_session(auth_user.session.id).await?;
  info!(
    session_id = %auth_user.session.id,
    impersonated = auth_user.is_impersonated(),
    "Session revoked."
  );
  Ok(HttpResponse::NoContent().finish())
}

#[instrument(name = "handler::me", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn me_handler(app_state: web::Data<AppState>, auth_user: AuthenticatedUser) -> Result<HttpResponse, AppError> {
  let unread = app_state.store.unread_count(auth_user.user.id).await?;
  Ok(HttpResponse::Ok().json(json!({
    "user": auth_user.user,
    "roles": auth_user.roles,
    "primary_role": auth_user.roles.primary().map(|r| r.as_str().to_string()),
    "impersonated": auth_user.is_impersonated(),
    "unread_notifications": unread,
  })))
}
