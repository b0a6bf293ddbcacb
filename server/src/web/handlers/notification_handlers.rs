// homeworks/src/web/handlers/notification_handlers.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Deserialize, Debug)]
pub struct ListNotificationsQuery {
  pub limit: Option<i64>,
}

#[instrument(name = "handler::list_notifications", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn list_notifications_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  query: web::Query<ListNotificationsQuery>,
) -> Result<HttpResponse, AppError> {
  let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
  let items = app_state.store.list_notifications(auth_user.user.id, limit).await?;
  let unread = app_state.store.unread_count(auth_user.user.id).await?;
  Ok(HttpResponse::Ok().json(json!({ "items": items, "unread": unread })))
}

#[instrument(name = "handler::mark_notification_read", skip_all, fields(user_id = %auth_user.user.id, %notification_id))]
pub async fn mark_read_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  notification_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let notification_id = notification_id.into_inner();
  let notification = app_state
    .store
    .mark_notification_read(auth_user.user.id, notification_id, Utc::now())
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", notification_id)))?;
  Ok(HttpResponse::Ok().json(notification))
}
