// homeworks/src/web/handlers/user_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::instrument;

use crate::errors::AppError;
use crate::models::role::Role;
use crate::models::user::PublicContractor;
use crate::state::AppState;

/// Contractor directory for the public site. No sign-in; phones stay private.
#[instrument(name = "handler::public_contractors", skip_all)]
pub async fn public_contractors_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let contractors: Vec<PublicContractor> = app_state
    .store
    .list_users_with_role(&Role::Contractor)
    .await?
    .into_iter()
    .map(PublicContractor::from)
    .collect();
  Ok(HttpResponse::Ok().json(json!({ "items": contractors })))
}
