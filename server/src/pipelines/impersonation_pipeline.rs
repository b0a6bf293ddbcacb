// homeworks/src/pipelines/impersonation_pipeline.rs

//! "Login as user": a privileged caller receives a fresh session for another
//! user, linked to the caller's own session and recorded in the audit log.

use crate::errors::AppError;
use crate::models::audit::{NewAuditEntry, IMPERSONATION_START};
use crate::models::role::IMPERSONATORS;
use crate::pipelines::contexts::ImpersonationCtxData;
use crate::services::auth_service::{authenticate, issue_session};
use serde_json::json;
use stagehand::{ContextData, Pipeline, PipelineControl, Registry};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

pub fn register_impersonation_pipeline(registry: &Arc<Registry<AppError>>) {
  let mut p = Pipeline::<ImpersonationCtxData, AppError>::new(&[
    ("authenticate_caller", false, None),
    ("authorize_caller", false, None),
    ("load_target", false, None),
    ("mint_session", false, None),
    ("write_audit", false, None),
  ]);

  p.on_root("authenticate_caller", authenticate_caller);
  p.on_root("authorize_caller", authorize_caller);
  p.on_root("load_target", load_target);
  p.on_root("mint_session", mint_session);
  p.compensate_root("mint_session", revoke_minted_session);
  p.on_root("write_audit", write_audit);

  registry.register_pipeline(p);
  tracing::info!("Impersonation pipeline registered.");
}

#[instrument(name = "impersonation::authenticate_caller", skip(ctx_data), err(Display))]
async fn authenticate_caller(ctx_data: ContextData<ImpersonationCtxData>) -> Result<PipelineControl, AppError> {
  let (store, token, now) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.caller_token.clone(), guard.now)
  };
  let caller = authenticate(store.as_ref(), &token, now).await?;
  ctx_data.write().caller = Some(caller);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "impersonation::authorize_caller", skip(ctx_data), err(Display))]
async fn authorize_caller(ctx_data: ContextData<ImpersonationCtxData>) -> Result<PipelineControl, AppError> {
  let guard = ctx_data.read();
  let caller = guard
    .caller
    .as_ref()
    .ok_or_else(|| AppError::Auth("Not signed in.".to_string()))?;

  if caller.is_impersonated() {
    return Err(AppError::Forbidden(
      "Return to your own account before signing in as someone else.".to_string(),
    ));
  }
  if !caller.roles.has_any(IMPERSONATORS) {
    warn!(user_id = %caller.user.id, "Impersonation refused: caller lacks a privileged role.");
    return Err(AppError::Forbidden(
      "Only admin, ceo or general_manager can sign in as another user.".to_string(),
    ));
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "impersonation::load_target", skip(ctx_data), err(Display))]
async fn load_target(ctx_data: ContextData<ImpersonationCtxData>) -> Result<PipelineControl, AppError> {
  let (store, target_user_id) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.target_user_id)
  };
  let target = store
    .find_user(target_user_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("User {} not found", target_user_id)))?;
  ctx_data.write().target = Some(target);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "impersonation::mint_session", skip(ctx_data), err(Display))]
async fn mint_session(ctx_data: ContextData<ImpersonationCtxData>) -> Result<PipelineControl, AppError> {
  let (app_state, target_user_id, caller_session_id, now) = {
    let guard = ctx_data.read();
    let caller_session_id = guard.caller.as_ref().map(|c| c.session.id);
    (guard.app_state.clone(), guard.target_user_id, caller_session_id, guard.now)
  };
  let (session, tokens) = issue_session(
    app_state.store.as_ref(),
    &app_state.config,
    target_user_id,
    caller_session_id,
    now,
  )
  .await?;
  let mut guard = ctx_data.write();
  guard.minted_session = Some(session);
  guard.tokens = Some(tokens);
  Ok(PipelineControl::Continue)
}

async fn revoke_minted_session(ctx_data: ContextData<ImpersonationCtxData>) -> Result<PipelineControl, AppError> {
  let (store, session_id) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.minted_session.as_ref().map(|s| s.id))
  };
  let Some(session_id) = session_id else {
    return Ok(PipelineControl::Continue);
  };
  if let Err(e) = store.revoke_session(session_id).await {
    error!(%session_id, error = %e, "Could not revoke impersonation session.");
    return Err(e);
  }
  ctx_data.write().tokens = None;
  warn!(%session_id, "Impersonation session revoked after a failed run.");
  Ok(PipelineControl::Continue)
}

#[instrument(name = "impersonation::write_audit", skip(ctx_data), err(Display))]
async fn write_audit(ctx_data: ContextData<ImpersonationCtxData>) -> Result<PipelineControl, AppError> {
  let (store, entry) = {
    let guard = ctx_data.read();
    let caller = guard
      .caller
      .as_ref()
      .ok_or_else(|| AppError::Internal("Caller missing from impersonation context.".to_string()))?;
    let entry = NewAuditEntry {
      actor_id: caller.user.id,
      action: IMPERSONATION_START,
      subject_id: Some(guard.target_user_id),
      detail: json!({
        "caller_roles": caller.roles.tags(),
        "caller_session_id": caller.session.id,
        "session_id": guard.minted_session.as_ref().map(|s| s.id),
      }),
    };
    (guard.app_state.store.clone(), entry)
  };
  let row = store.insert_audit(entry).await?;
  info!(audit_id = %row.id, actor_id = %row.actor_id, "Impersonation started.");
  Ok(PipelineControl::Continue)
}
