// homeworks/src/pipelines/common_steps.rs

//! Pieces shared by several pipelines.

use crate::errors::AppError;
use crate::models::notification::NewNotification;
use crate::models::order::Order;
use crate::state::AppState;
use crate::store::Store;
use stagehand::{ContextData, SkipCondition};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Skip condition from a plain predicate over the context.
pub fn skip_when<T>(predicate: fn(&T) -> bool) -> Option<SkipCondition<T>>
where
  T: Send + Sync + 'static,
{
  Some(Arc::new(move |ctx_data: ContextData<T>| predicate(&ctx_data.read())))
}

/// Loads an order that is visible to workflows: it must exist and not be archived.
pub async fn load_active_order(store: &dyn Store, order_id: Uuid) -> Result<Order, AppError> {
  match store.find_order(order_id).await? {
    Some(order) if !order.archived => Ok(order),
    Some(_) => Err(AppError::NotFound(format!("Order {} is archived", order_id))),
    None => Err(AppError::NotFound(format!("Order {} not found", order_id))),
  }
}

/// Tells the order's customer about a change. Failures are logged, never propagated.
pub async fn notify_order_customer(app_state: &AppState, order: &Order, title: String, body: String) -> bool {
  let result = app_state
    .notifier
    .notify(NewNotification {
      recipient_id: order.customer_id,
      title,
      body,
      link: Some(format!("/orders/{}", order.id)),
      kind: "order".to_string(),
    })
    .await;
  match result {
    Ok(n) => {
      info!(notification_id = %n.id, order_code = %order.code, "Customer notified.");
      true
    }
    Err(e) => {
      warn!(error = %e, order_code = %order.code, "Could not notify customer.");
      false
    }
  }
}
