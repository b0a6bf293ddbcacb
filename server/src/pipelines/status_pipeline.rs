// homeworks/src/pipelines/status_pipeline.rs

//! Moves an order along its lifecycle. The transition table and the per-status
//! role gate are both enforced here, so every caller gets the same answer.

use super::common_steps::{load_active_order, notify_order_customer, skip_when};
use crate::errors::AppError;
use crate::models::approval::Approval;
use crate::models::order::{Order, OrderStatus};
use crate::models::role::{Role, RoleSet};
use crate::pipelines::contexts::{Actor, StatusChangeCtxData};
use stagehand::{ContextData, Pipeline, PipelineControl, Registry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Whether `user_id` holding `roles` may move `order` to `target`.
///
/// `ledger` is only consulted for rejections: any role with a slot on the order may reject it.
pub fn may_set_status(roles: &RoleSet, user_id: Uuid, order: &Order, ledger: &[Approval], target: OrderStatus) -> bool {
  let assigned_contractor = roles.has(&Role::Contractor) && order.contractor_id == Some(user_id);
  match target {
    OrderStatus::Draft => false,
    OrderStatus::Pending => order.customer_id == user_id || roles.has_any(&[Role::Admin, Role::SalesManager]),
    OrderStatus::Approved => roles.has_any(&[Role::Admin, Role::Ceo, Role::GeneralManager]),
    OrderStatus::Rejected => {
      roles.has_any(&[Role::Admin, Role::Ceo, Role::GeneralManager])
        || ledger.iter().any(|slot| roles.has_tag(&slot.approver_role))
    }
    OrderStatus::InProgress => {
      assigned_contractor || roles.has_any(&[Role::Admin, Role::GeneralManager, Role::ScaffoldExecutiveManager])
    }
    OrderStatus::Completed => assigned_contractor || roles.has_any(&[Role::Admin, Role::GeneralManager]),
    OrderStatus::Paid => roles.has_any(&[Role::Admin, Role::FinanceManager]),
    OrderStatus::Closed => roles.has_any(&[Role::Admin, Role::GeneralManager, Role::FinanceManager]),
  }
}

pub fn register_status_pipeline(registry: &Arc<Registry<AppError>>) {
  let mut p = Pipeline::<StatusChangeCtxData, AppError>::new(&[
    ("load_order", false, None),
    (
      "authorize_transition",
      false,
      skip_when(|c: &StatusChangeCtxData| matches!(c.actor, Actor::System)),
    ),
    ("validate_transition", false, None),
    ("apply_status", false, None),
    (
      "open_approval_slots",
      false,
      skip_when(|c: &StatusChangeCtxData| c.target != OrderStatus::Pending),
    ),
    ("notify_customer", true, None),
  ]);

  p.on_root("load_order", load_order);
  p.on_root("authorize_transition", authorize_transition);
  p.on_root("validate_transition", validate_transition);
  p.on_root("apply_status", apply_status);
  p.compensate_root("apply_status", restore_status);
  p.on_root("open_approval_slots", open_approval_slots);
  p.on_root("notify_customer", notify_customer);
  p.set_timeout("notify_customer", Duration::from_secs(5));

  registry.register_pipeline(p);
  tracing::info!("Status change pipeline registered.");
}

#[instrument(name = "status::load_order", skip(ctx_data), err(Display))]
async fn load_order(ctx_data: ContextData<StatusChangeCtxData>) -> Result<PipelineControl, AppError> {
  let (store, order_id) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.order_id)
  };
  let order = load_active_order(store.as_ref(), order_id).await?;
  let ledger = store.list_approvals(order_id).await?;
  let mut guard = ctx_data.write();
  guard.previous_status = Some(order.status);
  guard.order = Some(order);
  guard.ledger = ledger;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "status::authorize_transition", skip(ctx_data), err(Display))]
async fn authorize_transition(ctx_data: ContextData<StatusChangeCtxData>) -> Result<PipelineControl, AppError> {
  let guard = ctx_data.read();
  let Actor::User(principal) = &guard.actor else {
    return Ok(PipelineControl::Continue);
  };
  let order = guard
    .order
    .as_ref()
    .ok_or_else(|| AppError::Internal("Order missing from status context.".to_string()))?;

  if !may_set_status(&principal.roles, principal.user.id, order, &guard.ledger, guard.target) {
    warn!(user_id = %principal.user.id, order_code = %order.code, target = %guard.target, "Status change denied.");
    return Err(AppError::Forbidden(format!(
      "You cannot move order {} to '{}'",
      order.code, guard.target
    )));
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "status::validate_transition", skip(ctx_data), err(Display))]
async fn validate_transition(ctx_data: ContextData<StatusChangeCtxData>) -> Result<PipelineControl, AppError> {
  let guard = ctx_data.read();
  let order = guard
    .order
    .as_ref()
    .ok_or_else(|| AppError::Internal("Order missing from status context.".to_string()))?;
  if !order.status.can_transition_to(guard.target) {
    return Err(AppError::Conflict(format!(
      "Order {} cannot move from '{}' to '{}'",
      order.code, order.status, guard.target
    )));
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "status::apply_status", skip(ctx_data), err(Display))]
async fn apply_status(ctx_data: ContextData<StatusChangeCtxData>) -> Result<PipelineControl, AppError> {
  let (store, order_id, expected, target, reason) = {
    let guard = ctx_data.read();
    (
      guard.app_state.store.clone(),
      guard.order_id,
      guard.previous_status,
      guard.target,
      guard.reason.clone(),
    )
  };
  let expected = expected.ok_or_else(|| AppError::Internal("Order missing from status context.".to_string()))?;
  let order = store
    .update_order_status(order_id, expected, target)
    .await?
    .ok_or_else(|| AppError::Conflict(format!("Order {} changed status while it was being updated", order_id)))?;
  info!(order_code = %order.code, status = %order.status, reason = reason.as_deref().unwrap_or(""), "Order status changed.");
  ctx_data.write().order = Some(order);
  Ok(PipelineControl::Continue)
}

async fn restore_status(ctx_data: ContextData<StatusChangeCtxData>) -> Result<PipelineControl, AppError> {
  let (store, order_id, previous, target) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.order_id, guard.previous_status, guard.target)
  };
  let Some(previous) = previous else {
    return Ok(PipelineControl::Continue);
  };
  match store.update_order_status(order_id, target, previous).await {
    Ok(Some(_)) => {
      warn!(%order_id, status = %previous, "Order status restored after a failed change.");
      Ok(PipelineControl::Continue)
    }
    Ok(None) => {
      warn!(%order_id, "Order moved on before its status could be restored.");
      Ok(PipelineControl::Continue)
    }
    Err(e) => {
      error!(%order_id, error = %e, "Could not restore order status.");
      Err(e)
    }
  }
}

#[instrument(name = "status::open_approval_slots", skip(ctx_data), err(Display))]
async fn open_approval_slots(ctx_data: ContextData<StatusChangeCtxData>) -> Result<PipelineControl, AppError> {
  let (store, order_id, chain) = {
    let guard = ctx_data.read();
    (
      guard.app_state.store.clone(),
      guard.order_id,
      guard.app_state.config.approval_chain.clone(),
    )
  };
  let ledger = store.open_approval_slots(order_id, &chain).await?;
  info!(%order_id, slots = ledger.len(), "Approval slots opened.");
  ctx_data.write().ledger = ledger;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "status::notify_customer", skip(ctx_data), err(Display))]
async fn notify_customer(ctx_data: ContextData<StatusChangeCtxData>) -> Result<PipelineControl, AppError> {
  let (app_state, order, reason) = {
    let guard = ctx_data.read();
    (guard.app_state.clone(), guard.order.clone(), guard.reason.clone())
  };
  let Some(order) = order else {
    return Ok(PipelineControl::Continue);
  };
  let mut body = format!("Status is now: {}.", order.status.label());
  if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
    body.push_str(&format!(" Reason: {}", reason.trim()));
  }
  let notified = notify_order_customer(&app_state, &order, format!("Order {} updated", order.code), body).await;
  ctx_data.write().customer_notified = notified;
  Ok(PipelineControl::Continue)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;
  use crate::models::order::{service_code, NewOrder};
  use crate::services::sms::OutboxSmsSender;
  use crate::state::AppState;
  use crate::store::{MemoryStore, OrderStore};
  use chrono::Utc;

  fn order(customer_id: Uuid, contractor_id: Option<Uuid>, status: OrderStatus) -> Order {
    let now = Utc::now();
    Order {
      id: Uuid::new_v4(),
      code: "ORD-1001".to_string(),
      customer_id,
      service_id: None,
      location: None,
      status,
      payment_amount: 0,
      contractor_id,
      archived: false,
      created_at: now,
      updated_at: now,
    }
  }

  fn slot(role: &str) -> Approval {
    Approval {
      id: Uuid::new_v4(),
      order_id: Uuid::new_v4(),
      approver_role: role.to_string(),
      approver_user_id: None,
      approved_at: None,
      created_at: Utc::now(),
    }
  }

  #[test]
  fn customers_submit_only_their_own_orders() {
    let customer = Uuid::new_v4();
    let roles = RoleSet::from_tags(["customer"]);
    let o = order(customer, None, OrderStatus::Draft);
    assert!(may_set_status(&roles, customer, &o, &[], OrderStatus::Pending));
    assert!(!may_set_status(&roles, Uuid::new_v4(), &o, &[], OrderStatus::Pending));
    assert!(!may_set_status(&roles, customer, &o, &[], OrderStatus::Approved));
  }

  #[test]
  fn ledger_roles_may_reject() {
    let user = Uuid::new_v4();
    let o = order(Uuid::new_v4(), None, OrderStatus::Pending);
    let sales = RoleSet::from_tags(["sales_manager"]);
    assert!(may_set_status(&sales, user, &o, &[slot("sales_manager")], OrderStatus::Rejected));
    assert!(!may_set_status(&sales, user, &o, &[slot("ceo")], OrderStatus::Rejected));
  }

  #[test]
  fn only_the_assigned_contractor_starts_work() {
    let contractor = Uuid::new_v4();
    let roles = RoleSet::from_tags(["contractor"]);
    let assigned = order(Uuid::new_v4(), Some(contractor), OrderStatus::Approved);
    let other = order(Uuid::new_v4(), Some(Uuid::new_v4()), OrderStatus::Approved);
    assert!(may_set_status(&roles, contractor, &assigned, &[], OrderStatus::InProgress));
    assert!(!may_set_status(&roles, contractor, &other, &[], OrderStatus::InProgress));
  }

  #[tokio::test]
  async fn a_status_that_moved_on_mid_change_is_a_conflict() {
    let store = Arc::new(MemoryStore::new());
    let state =
      AppState::with_sms(AppConfig::default(), store.clone(), Arc::new(OutboxSmsSender::new())).unwrap();
    let seq = store.next_order_sequence().await.unwrap();
    let placed = store
      .insert_order(
        NewOrder {
          customer_id: Uuid::new_v4(),
          service_id: None,
          location: None,
          payment_amount: 0,
        },
        service_code(seq),
      )
      .await
      .unwrap();

    let ctx = ContextData::new(StatusChangeCtxData::new(
      state,
      placed.id,
      OrderStatus::Pending,
      Actor::System,
      None,
    ));
    load_order(ctx.clone()).await.unwrap();

    // A second request submits and rejects the order between our load and our write.
    store.update_order_status(placed.id, OrderStatus::Draft, OrderStatus::Pending).await.unwrap().unwrap();
    store.update_order_status(placed.id, OrderStatus::Pending, OrderStatus::Rejected).await.unwrap().unwrap();

    let err = apply_status(ctx.clone()).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Rolling back must not clobber the newer status either.
    restore_status(ctx).await.unwrap();
    let current = store.find_order(placed.id).await.unwrap().unwrap();
    assert_eq!(current.status, OrderStatus::Rejected);
  }

  #[test]
  fn nobody_moves_an_order_back_to_draft() {
    let admin = RoleSet::from_tags(["admin"]);
    let o = order(Uuid::new_v4(), None, OrderStatus::Pending);
    assert!(!may_set_status(&admin, Uuid::new_v4(), &o, &[], OrderStatus::Draft));
    assert!(may_set_status(&admin, Uuid::new_v4(), &o, &[], OrderStatus::Closed));
  }
}
