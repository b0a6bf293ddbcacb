// homeworks/src/pipelines/approval_pipeline.rs

//! Records one role's sign-off on an order and advances the order once every
//! ledger slot is approved.

use super::common_steps::{load_active_order, notify_order_customer, skip_when};
use crate::errors::AppError;
use crate::models::approval::{ApprovalOutcome, ApprovalProgress};
use crate::models::order::OrderStatus;
use crate::pipelines::contexts::ApprovalCtxData;
use stagehand::{ContextData, Pipeline, PipelineControl, Registry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{event, info, instrument, warn, Level};

pub fn register_approval_pipeline(registry: &Arc<Registry<AppError>>) {
  let mut p = Pipeline::<ApprovalCtxData, AppError>::new(&[
    ("load_order", false, None),
    ("authorize_approver", false, None),
    ("record_approval", false, None),
    ("recompute_progress", false, None),
    (
      "advance_order",
      false,
      skip_when(|c: &ApprovalCtxData| {
        !c.progress.is_complete() || c.order.as_ref().map_or(true, |o| o.status != OrderStatus::Pending)
      }),
    ),
    (
      "notify_customer",
      true,
      skip_when(|c: &ApprovalCtxData| matches!(c.outcome, Some(ApprovalOutcome::NoPendingSlot) | None)),
    ),
  ]);

  p.on_root("load_order", load_order);
  p.on_root("authorize_approver", authorize_approver);
  p.on_root("record_approval", record_approval);
  p.on_root("recompute_progress", recompute_progress);
  p.on_root("advance_order", advance_order);
  p.on_root("notify_customer", notify_customer);
  p.set_timeout("notify_customer", Duration::from_secs(5));

  registry.register_pipeline(p);
  tracing::info!("Approval pipeline registered.");
}

#[instrument(name = "approval::load_order", skip(ctx_data), err(Display))]
async fn load_order(ctx_data: ContextData<ApprovalCtxData>) -> Result<PipelineControl, AppError> {
  let (store, order_id) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.order_id)
  };
  let order = load_active_order(store.as_ref(), order_id).await?;
  if order.status.is_terminal() {
    return Err(AppError::Conflict(format!(
      "Order {} is {} and no longer takes approvals",
      order.code, order.status
    )));
  }
  ctx_data.write().order = Some(order);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "approval::authorize_approver", skip(ctx_data), err(Display))]
async fn authorize_approver(ctx_data: ContextData<ApprovalCtxData>) -> Result<PipelineControl, AppError> {
  let guard = ctx_data.read();
  if !guard.actor.roles.has_tag(&guard.role) {
    warn!(user_id = %guard.actor.user.id, role = %guard.role, "Approver does not hold the role.");
    return Err(AppError::Forbidden(format!(
      "Only a holder of the '{}' role can sign off for it",
      guard.role
    )));
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "approval::record_approval", skip(ctx_data), err(Display))]
async fn record_approval(ctx_data: ContextData<ApprovalCtxData>) -> Result<PipelineControl, AppError> {
  let (store, order_id, role, user_id, now) = {
    let guard = ctx_data.read();
    (
      guard.app_state.store.clone(),
      guard.order_id,
      guard.role.clone(),
      guard.actor.user.id,
      guard.now,
    )
  };

  let outcome = match store.record_approval(order_id, &role, user_id, now).await? {
    Some(row) => {
      info!(%order_id, %role, "Sign-off recorded.");
      ApprovalOutcome::Recorded(row)
    }
    None => {
      // No pending slot for this role: nothing to write and nothing to report as an error.
      event!(Level::INFO, %order_id, %role, "No pending approval slot; nothing recorded.");
      ApprovalOutcome::NoPendingSlot
    }
  };
  ctx_data.write().outcome = Some(outcome);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "approval::recompute_progress", skip(ctx_data), err(Display))]
async fn recompute_progress(ctx_data: ContextData<ApprovalCtxData>) -> Result<PipelineControl, AppError> {
  let (store, order_id) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.order_id)
  };
  let ledger = store.list_approvals(order_id).await?;
  let progress = ApprovalProgress::from_ledger(&ledger);
  event!(Level::DEBUG, approved = progress.approved, total = progress.total, "Progress recomputed.");
  let mut guard = ctx_data.write();
  guard.ledger = ledger;
  guard.progress = progress;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "approval::advance_order", skip(ctx_data), err(Display))]
async fn advance_order(ctx_data: ContextData<ApprovalCtxData>) -> Result<PipelineControl, AppError> {
  let (store, order_id) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.order_id)
  };
  if let Some(order) = store
    .update_order_status(order_id, OrderStatus::Pending, OrderStatus::Approved)
    .await?
  {
    info!(order_code = %order.code, "Every role signed off; order approved.");
    let mut guard = ctx_data.write();
    guard.advanced_to = Some(order.status);
    guard.order = Some(order);
    return Ok(PipelineControl::Continue);
  }

  // Another request moved the order first. A concurrent final sign-off is fine.
  match store.find_order(order_id).await? {
    Some(order) if order.status == OrderStatus::Approved => {
      event!(Level::INFO, order_code = %order.code, "Order was already approved by a concurrent sign-off.");
      ctx_data.write().order = Some(order);
      Ok(PipelineControl::Continue)
    }
    Some(order) => Err(AppError::Conflict(format!(
      "Order {} moved to '{}' before it could be approved",
      order.code, order.status
    ))),
    None => Err(AppError::NotFound(format!("Order {} not found", order_id))),
  }
}

#[instrument(name = "approval::notify_customer", skip(ctx_data), err(Display))]
async fn notify_customer(ctx_data: ContextData<ApprovalCtxData>) -> Result<PipelineControl, AppError> {
  let (app_state, order, role, progress, advanced) = {
    let guard = ctx_data.read();
    (
      guard.app_state.clone(),
      guard.order.clone(),
      guard.role.clone(),
      guard.progress,
      guard.advanced_to.is_some(),
    )
  };
  let Some(order) = order else {
    return Ok(PipelineControl::Continue);
  };
  let (title, body) = if advanced {
    (
      format!("Order {} approved", order.code),
      "All required sign-offs are in. Work can be scheduled.".to_string(),
    )
  } else {
    (
      format!("Order {} progress", order.code),
      format!("{} signed off ({}% of approvals).", role, progress.percent()),
    )
  };
  let notified = notify_order_customer(&app_state, &order, title, body).await;
  ctx_data.write().customer_notified = notified;
  Ok(PipelineControl::Continue)
}
