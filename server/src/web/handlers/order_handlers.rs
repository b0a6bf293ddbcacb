// homeworks/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::run_pipeline;
use crate::errors::AppError;
use crate::models::approval::ApprovalProgress;
use crate::models::audit::{NewAuditEntry, ORDER_ARCHIVED};
use crate::models::notification::NewNotification;
use crate::models::order::{service_code, NewOrder, Order, OrderFilter, OrderStatus};
use crate::models::role::Role;
use crate::pipelines::contexts::{Actor, ApprovalCtxData, StatusChangeCtxData};
use crate::services::auth_service::Principal;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;
use stagehand::ContextData;

#[derive(Deserialize, Debug)]
pub struct CreateOrderPayload {
  pub service_id: Option<Uuid>,
  pub location: Option<String>,
  #[serde(default)]
  pub payment_amount: i64,
}

#[derive(Deserialize, Debug)]
pub struct ListOrdersQuery {
  #[serde(default)]
  pub include_archived: bool,
}

#[derive(Deserialize, Debug)]
pub struct ChangeStatusPayload {
  pub status: OrderStatus,
  pub reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct RejectPayload {
  pub reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct AssignContractorPayload {
  pub contractor_id: Uuid,
}

fn can_view(principal: &Principal, order: &Order) -> bool {
  let user_id = principal.user.id;
  principal.roles.is_staff() || order.customer_id == user_id || order.contractor_id == Some(user_id)
}

/// The order if the caller may see it. Hidden and missing orders look the same.
async fn load_visible_order(app_state: &AppState, principal: &Principal, order_id: Uuid) -> Result<Order, AppError> {
  match app_state.store.find_order(order_id).await? {
    Some(order) if can_view(principal, &order) && (!order.archived || principal.roles.is_staff()) => Ok(order),
    _ => Err(AppError::NotFound(format!("Order {} not found", order_id))),
  }
}

fn order_view(order: &Order, progress: Option<ApprovalProgress>) -> serde_json::Value {
  json!({
    "order": order,
    "status_label": order.status.label(),
    "badge_color": order.status.badge_color(),
    "next_statuses": order.status.next_statuses(),
    "approval_progress": progress.map(|p| json!({
      "approved": p.approved,
      "total": p.total,
      "percent": p.percent(),
    })),
  })
}

#[instrument(name = "handler::list_orders", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  query: web::Query<ListOrdersQuery>,
) -> Result<HttpResponse, AppError> {
  let filter = if auth_user.roles.is_staff() {
    OrderFilter {
      customer_id: None,
      include_archived: query.include_archived && auth_user.roles.has(&Role::Admin),
    }
  } else {
    OrderFilter {
      customer_id: Some(auth_user.user.id),
      include_archived: false,
    }
  };
  let orders = app_state.store.list_orders(filter).await?;
  Ok(HttpResponse::Ok().json(json!({ "items": orders, "count": orders.len() })))
}

#[instrument(name = "handler::create_order", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<CreateOrderPayload>,
) -> Result<HttpResponse, AppError> {
  auth_user.require_any(&[Role::Customer, Role::Admin, Role::SalesManager])?;
  if payload.payment_amount < 0 {
    return Err(AppError::Validation("payment_amount cannot be negative.".to_string()));
  }
  let payload = payload.into_inner();
  let sequence = app_state.store.next_order_sequence().await?;
  let order = app_state
    .store
    .insert_order(
      NewOrder {
        customer_id: auth_user.user.id,
        service_id: payload.service_id,
        location: payload.location.filter(|l| !l.trim().is_empty()),
        payment_amount: payload.payment_amount,
      },
      service_code(sequence),
    )
    .await?;
  info!(order_code = %order.code, "Order created.");
  Ok(HttpResponse::Created().json(order_view(&order, None)))
}

#[instrument(name = "handler::get_order", skip_all, fields(%order_id))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order_id = order_id.into_inner();
  let order = load_visible_order(&app_state, &auth_user, order_id).await?;
  let ledger = app_state.store.list_approvals(order_id).await?;
  let progress = (!ledger.is_empty()).then(|| ApprovalProgress::from_ledger(&ledger));
  Ok(HttpResponse::Ok().json(order_view(&order, progress)))
}

async fn change_status(
  app_state: &AppState,
  principal: Principal,
  order_id: Uuid,
  target: OrderStatus,
  reason: Option<String>,
) -> Result<HttpResponse, AppError> {
  let ctx_data = ContextData::new(StatusChangeCtxData::new(
    app_state.clone(),
    order_id,
    target,
    Actor::User(principal),
    reason,
  ));
  run_pipeline(app_state, ctx_data.clone(), "change_status").await?;

  let guard = ctx_data.read();
  let order = guard
    .order
    .as_ref()
    .ok_or_else(|| AppError::Internal("Status change completed without an order.".to_string()))?;
  let progress = (!guard.ledger.is_empty()).then(|| ApprovalProgress::from_ledger(&guard.ledger));
  let mut body = order_view(order, progress);
  body["previous_status"] = json!(guard.previous_status);
  body["customer_notified"] = json!(guard.customer_notified);
  Ok(HttpResponse::Ok().json(body))
}

#[instrument(name = "handler::change_status", skip_all, fields(%order_id, target = %payload.status))]
pub async fn change_status_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
  payload: web::Json<ChangeStatusPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  change_status(&app_state, auth_user.0, order_id.into_inner(), payload.status, payload.reason).await
}

#[instrument(name = "handler::reject_order", skip_all, fields(%order_id))]
pub async fn reject_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
  payload: Option<web::Json<RejectPayload>>,
) -> Result<HttpResponse, AppError> {
  let reason = payload.and_then(|p| p.into_inner().reason);
  change_status(&app_state, auth_user.0, order_id.into_inner(), OrderStatus::Rejected, reason).await
}

#[instrument(name = "handler::archive_order", skip_all, fields(%order_id))]
pub async fn archive_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  auth_user.require_any(&[Role::Admin])?;
  let order_id = order_id.into_inner();
  let order = app_state
    .store
    .archive_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
  app_state
    .store
    .insert_audit(NewAuditEntry {
      actor_id: auth_user.user.id,
      action: ORDER_ARCHIVED,
      subject_id: Some(order.id),
      detail: json!({ "code": order.code, "status": order.status }),
    })
    .await?;
  Ok(HttpResponse::Ok().json(order_view(&order, None)))
}

#[instrument(name = "handler::assign_contractor", skip_all, fields(%order_id, contractor_id = %payload.contractor_id))]
pub async fn assign_contractor_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
  payload: web::Json<AssignContractorPayload>,
) -> Result<HttpResponse, AppError> {
  auth_user.require_any(&[Role::Admin, Role::GeneralManager])?;
  let order_id = order_id.into_inner();
  let contractor_id = payload.contractor_id;

  if app_state.store.find_user(contractor_id).await?.is_none() {
    return Err(AppError::NotFound(format!("User {} not found", contractor_id)));
  }
  if !app_state.store.roles_for(contractor_id).await?.has(&Role::Contractor) {
    return Err(AppError::Validation("The assignee does not hold the contractor role.".to_string()));
  }
  let order = app_state
    .store
    .assign_contractor(order_id, contractor_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

  let notice = NewNotification {
    recipient_id: contractor_id,
    title: format!("Assigned to order {}", order.code),
    body: order.location.clone().unwrap_or_else(|| "A new order was assigned to you.".to_string()),
    link: Some(format!("/orders/{}", order.id)),
    kind: "assignment".to_string(),
  };
  if let Err(e) = app_state.notifier.notify(notice).await {
    warn!(error = %e, "Could not notify contractor about the assignment.");
  }
  Ok(HttpResponse::Ok().json(order_view(&order, None)))
}

#[instrument(name = "handler::list_approvals", skip_all, fields(%order_id))]
pub async fn list_approvals_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = load_visible_order(&app_state, &auth_user, order_id.into_inner()).await?;
  let ledger = app_state.store.list_approvals(order.id).await?;
  let progress = ApprovalProgress::from_ledger(&ledger);
  Ok(HttpResponse::Ok().json(json!({
    "order_code": order.code,
    "ledger": ledger,
    "progress": {
      "approved": progress.approved,
      "total": progress.total,
      "ratio": progress.ratio(),
      "percent": progress.percent(),
      "complete": progress.is_complete(),
    },
  })))
}

#[instrument(name = "handler::approve_order", skip_all, fields(order_id = %path.0, role = %path.1))]
pub async fn approve_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse, AppError> {
  let (order_id, role) = path.into_inner();
  let ctx_data = ContextData::new(ApprovalCtxData::new(
    app_state.get_ref().clone(),
    order_id,
    role,
    auth_user.0,
    Utc::now(),
  ));
  run_pipeline(&app_state, ctx_data.clone(), "approve_order").await?;

  let guard = ctx_data.read();
  let outcome = guard.outcome.as_ref().map(|o| o.as_str()).unwrap_or("no_pending_slot");
  Ok(HttpResponse::Ok().json(json!({
    "outcome": outcome,
    "order_status": guard.order.as_ref().map(|o| o.status),
    "advanced": guard.advanced_to.is_some(),
    "progress": {
      "approved": guard.progress.approved,
      "total": guard.progress.total,
      "percent": guard.progress.percent(),
    },
    "ledger": guard.ledger,
  })))
}

fn may_manage_reports(principal: &Principal, order: &Order) -> bool {
  principal.roles.has_any(&[Role::Admin, Role::GeneralManager, Role::ScaffoldExecutiveManager])
    || order.contractor_id == Some(principal.user.id)
}

#[instrument(name = "handler::list_report_locks", skip_all, fields(%order_id))]
pub async fn list_report_locks_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = load_visible_order(&app_state, &auth_user, order_id.into_inner()).await?;
  let locks = app_state.store.list_report_locks(order.id).await?;
  Ok(HttpResponse::Ok().json(json!({ "items": locks })))
}

#[instrument(name = "handler::lock_report_date", skip_all, fields(order_id = %path.0, report_date = %path.1))]
pub async fn lock_report_date_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<(Uuid, NaiveDate)>,
) -> Result<HttpResponse, AppError> {
  let (order_id, report_date) = path.into_inner();
  let order = load_visible_order(&app_state, &auth_user, order_id).await?;
  if !may_manage_reports(&auth_user, &order) {
    return Err(AppError::Forbidden("You cannot lock reports on this order.".to_string()));
  }
  let lock = app_state
    .store
    .insert_report_lock(order.id, report_date, auth_user.user.id)
    .await?;
  Ok(HttpResponse::Created().json(lock))
}

#[instrument(name = "handler::unlock_report_date", skip_all, fields(order_id = %path.0, report_date = %path.1))]
pub async fn unlock_report_date_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<(Uuid, NaiveDate)>,
) -> Result<HttpResponse, AppError> {
  let (order_id, report_date) = path.into_inner();
  let order = load_visible_order(&app_state, &auth_user, order_id).await?;
  if !may_manage_reports(&auth_user, &order) {
    return Err(AppError::Forbidden("You cannot unlock reports on this order.".to_string()));
  }
  if !app_state.store.delete_report_lock(order.id, report_date).await? {
    return Err(AppError::NotFound(format!("{} is not locked", report_date)));
  }
  Ok(HttpResponse::NoContent().finish())
}

#[derive(Deserialize)]
pub struct SaveReportPayload {
  pub content: serde_json::Value,
}

/// Saves a new revision of the day's report. Locked days answer 409.
#[instrument(name = "handler::save_report_version", skip_all, fields(order_id = %path.0, report_date = %path.1))]
pub async fn save_report_version_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<(Uuid, NaiveDate)>,
  payload: web::Json<SaveReportPayload>,
) -> Result<HttpResponse, AppError> {
  let (order_id, report_date) = path.into_inner();
  let order = load_visible_order(&app_state, &auth_user, order_id).await?;
  if !may_manage_reports(&auth_user, &order) {
    return Err(AppError::Forbidden("You cannot write reports on this order.".to_string()));
  }
  let payload = payload.into_inner();
  if payload.content.is_null() {
    return Err(AppError::Validation("Report content is required.".to_string()));
  }
  let version = app_state
    .store
    .save_report_version(order.id, report_date, payload.content, auth_user.user.id)
    .await?;
  info!(order_code = %order.code, version = version.version, "Daily report saved.");
  Ok(HttpResponse::Created().json(version))
}

#[instrument(name = "handler::list_report_versions", skip_all, fields(order_id = %path.0, report_date = %path.1))]
pub async fn list_report_versions_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<(Uuid, NaiveDate)>,
) -> Result<HttpResponse, AppError> {
  let (order_id, report_date) = path.into_inner();
  let order = load_visible_order(&app_state, &auth_user, order_id).await?;
  let versions = app_state.store.list_report_versions(order.id, report_date).await?;
  Ok(HttpResponse::Ok().json(json!({ "items": versions })))
}

/// Opens a gateway payment for a completed order and returns where to send the browser.
#[instrument(name = "handler::start_payment", skip_all, fields(%order_id))]
pub async fn start_payment_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = load_visible_order(&app_state, &auth_user, order_id.into_inner()).await?;
  if order.customer_id != auth_user.user.id && !auth_user.roles.has_any(&[Role::Admin, Role::FinanceManager]) {
    return Err(AppError::Forbidden("Only the customer can pay for this order.".to_string()));
  }
  if order.status != OrderStatus::Completed {
    return Err(AppError::Conflict(format!(
      "Order {} is {}; only completed orders can be paid",
      order.code, order.status
    )));
  }
  if order.payment_amount <= 0 {
    return Err(AppError::Validation(format!("Order {} has no amount due.", order.code)));
  }

  let callback_url = format!(
    "{}/api/v1/payments/verify",
    app_state.config.app_base_url.trim_end_matches('/')
  );
  let description = format!("Payment for order {}", order.code);
  let authority = app_state
    .payments
    .request(order.payment_amount, &description, &callback_url)
    .await?;
  let payment = app_state
    .store
    .insert_payment(order.id, &authority, order.payment_amount)
    .await?;
  let payment_url = app_state.payments.start_url(&authority)?;
  info!(order_code = %order.code, payment_id = %payment.id, "Payment opened.");
  Ok(HttpResponse::Created().json(json!({
    "payment": payment,
    "payment_url": payment_url,
  })))
}
