// homeworks/src/pipelines/otp_login_pipeline.rs

//! Phone + code sign-in. Unknown numbers are registered on first use: as the
//! whitelisted roles when the number is on the whitelist, otherwise as a customer.

use crate::errors::AppError;
use crate::models::otp::OtpPurpose;
use crate::models::role::Role;
use crate::pipelines::contexts::OtpLoginCtxData;
use crate::services::auth_service::issue_session;
use crate::services::otp_service::verify_otp;
use stagehand::{ContextData, Pipeline, PipelineControl, Registry};
use std::sync::Arc;
use tracing::{info, instrument};

pub fn register_otp_login_pipeline(registry: &Arc<Registry<AppError>>) {
  let mut p = Pipeline::<OtpLoginCtxData, AppError>::new(&[
    ("verify_code", false, None),
    ("resolve_user", false, None),
    ("issue_session", false, None),
  ]);

  p.on_root("verify_code", verify_code);
  p.on_root("resolve_user", resolve_user);
  p.on_root("issue_session", issue_login_session);

  registry.register_pipeline(p);
  tracing::info!("OTP login pipeline registered.");
}

#[instrument(name = "otp_login::verify_code", skip(ctx_data), err(Display))]
async fn verify_code(ctx_data: ContextData<OtpLoginCtxData>) -> Result<PipelineControl, AppError> {
  let (store, raw_phone, code, now) = {
    let guard = ctx_data.read();
    (
      guard.app_state.store.clone(),
      guard.raw_phone.clone(),
      guard.code.clone(),
      guard.now,
    )
  };
  let phone = verify_otp(store.as_ref(), &raw_phone, &code, OtpPurpose::Login, now).await?;
  ctx_data.write().phone = Some(phone);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "otp_login::resolve_user", skip(ctx_data), err(Display))]
async fn resolve_user(ctx_data: ContextData<OtpLoginCtxData>) -> Result<PipelineControl, AppError> {
  let (store, phone, full_name) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.phone.clone(), guard.full_name.clone())
  };
  let phone = phone.ok_or_else(|| AppError::Internal("Phone missing from login context.".to_string()))?;

  let (user, registered) = match store.find_user_by_phone(&phone).await? {
    Some(user) => (user, false),
    None => {
      let user = store.create_user(&phone, full_name).await?;
      let granted: Vec<Role> = match store.find_whitelist(&phone).await? {
        Some(entry) if !entry.allowed_roles.is_empty() => entry.allowed_roles.iter().map(|t| Role::from(t.as_str())).collect(),
        _ => vec![Role::Customer],
      };
      for role in &granted {
        store.grant_role(user.id, role).await?;
      }
      info!(user_id = %user.id, roles = ?granted, "New user registered.");
      (user, true)
    }
  };

  let roles = store.roles_for(user.id).await?;
  let mut guard = ctx_data.write();
  guard.user = Some(user);
  guard.roles = roles;
  guard.registered = registered;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "otp_login::issue_session", skip(ctx_data), err(Display))]
async fn issue_login_session(ctx_data: ContextData<OtpLoginCtxData>) -> Result<PipelineControl, AppError> {
  let (app_state, user_id, now) = {
    let guard = ctx_data.read();
    (guard.app_state.clone(), guard.user.as_ref().map(|u| u.id), guard.now)
  };
  let user_id = user_id.ok_or_else(|| AppError::Internal("User missing from login context.".to_string()))?;
  let (_, tokens) = issue_session(app_state.store.as_ref(), &app_state.config, user_id, None, now).await?;
  ctx_data.write().tokens = Some(tokens);
  Ok(PipelineControl::Continue)
}
