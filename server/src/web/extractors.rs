// homeworks/src/web/extractors.rs

use crate::errors::AppError;
use crate::models::role::Role;
use crate::services::auth_service::{authenticate, Principal};
use crate::state::AppState;
use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use chrono::Utc;
use futures_util::future::LocalBoxFuture;
use tracing::warn;

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
  let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
  let (scheme, token) = value.trim().split_once(' ')?;
  if !scheme.eq_ignore_ascii_case("bearer") {
    return None;
  }
  let token = token.trim();
  (!token.is_empty()).then(|| token.to_string())
}

/// The signed-in caller. Rejects the request with 401 when the bearer token
/// is missing, unknown or expired.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Principal);

impl AuthenticatedUser {
  /// 403 unless the caller holds at least one of `roles`.
  pub fn require_any(&self, roles: &[Role]) -> Result<(), AppError> {
    if self.0.roles.has_any(roles) {
      return Ok(());
    }
    let wanted: Vec<&str> = roles.iter().map(Role::as_str).collect();
    Err(AppError::Forbidden(format!("Requires one of: {}", wanted.join(", "))))
  }
}

impl std::ops::Deref for AuthenticatedUser {
  type Target = Principal;

  fn deref(&self) -> &Principal {
    &self.0
  }
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let app_state = req.app_data::<web::Data<AppState>>().cloned();
    let token = bearer_token(req);
    Box::pin(async move {
      let app_state =
        app_state.ok_or_else(|| AppError::Internal("Application state is not configured.".to_string()))?;
      let Some(token) = token else {
        warn!("Request without bearer token.");
        return Err(AppError::Auth("Sign in required.".to_string()));
      };
      let principal = authenticate(app_state.store.as_ref(), &token, Utc::now()).await?;
      Ok(AuthenticatedUser(principal))
    })
  }
}
