// homeworks/src/web/handlers/integration_handlers.rs

//! Thin proxies over the outbound integrations so the client never holds their keys.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::role::STAFF;
use crate::services::push::PushMessage;
use crate::services::routing::LatLng;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct PushRelayPayload {
  pub recipients: Vec<Uuid>,
  pub title: String,
  pub body: String,
  pub link: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct GeocodeQuery {
  pub q: String,
}

#[derive(Deserialize, Debug)]
pub struct RouteQuery {
  pub from: String,
  pub to: String,
}

#[derive(Deserialize, Debug)]
pub struct ModerationPayload {
  pub image_url: String,
}

#[instrument(name = "handler::push_relay", skip_all, fields(recipients = payload.recipients.len()))]
pub async fn push_relay_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<PushRelayPayload>,
) -> Result<HttpResponse, AppError> {
  auth_user.require_any(STAFF)?;
  if payload.recipients.is_empty() {
    return Err(AppError::Validation("At least one recipient is required.".to_string()));
  }
  let Some(push) = app_state.push.as_ref() else {
    return Ok(HttpResponse::Ok().json(json!({ "sent": false, "reason": "push relay not configured" })));
  };
  let payload = payload.into_inner();
  push
    .send(&PushMessage {
      recipients: payload.recipients,
      title: payload.title,
      body: payload.body,
      link: payload.link,
    })
    .await?;
  Ok(HttpResponse::Ok().json(json!({ "sent": true })))
}

#[instrument(name = "handler::geocode", skip_all)]
pub async fn geocode_handler(
  app_state: web::Data<AppState>,
  _auth_user: AuthenticatedUser,
  query: web::Query<GeocodeQuery>,
) -> Result<HttpResponse, AppError> {
  let result = app_state.geocoder.search(&query.q).await?;
  Ok(HttpResponse::Ok().json(result))
}

#[instrument(name = "handler::route", skip_all)]
pub async fn route_handler(
  app_state: web::Data<AppState>,
  _auth_user: AuthenticatedUser,
  query: web::Query<RouteQuery>,
) -> Result<HttpResponse, AppError> {
  let from: LatLng = query.from.parse()?;
  let to: LatLng = query.to.parse()?;
  let estimate = app_state.router.plan(from, to).await;
  Ok(HttpResponse::Ok().json(estimate))
}

#[instrument(name = "handler::moderate_image", skip_all)]
pub async fn moderation_handler(
  app_state: web::Data<AppState>,
  _auth_user: AuthenticatedUser,
  payload: web::Json<ModerationPayload>,
) -> Result<HttpResponse, AppError> {
  let verdict = app_state.moderator.check(&payload.image_url).await?;
  Ok(HttpResponse::Ok().json(verdict))
}
