// homeworks/src/services/auth_service.rs

//! Secret hashing, session issuance and bearer-token authentication.

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::role::RoleSet;
use crate::models::session::{NewSession, Session, SessionRotation, SessionTokens};
use crate::models::user::User;
use crate::services::tokens::{generate_token, hash_token};
use crate::store::Store;
use argon2::{
  password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Hashes a short secret (an OTP code) with Argon2.
#[instrument(name = "auth_service::hash_secret", skip(secret), err(Display))]
pub fn hash_secret(secret: &str) -> Result<String, AppError> {
  if secret.is_empty() {
    return Err(AppError::Validation("Secret cannot be empty for hashing.".to_string()));
  }
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(secret.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|argon_err| {
      error!(error = %argon_err, "Argon2 hashing failed.");
      AppError::Internal(format!("Hashing failed: {}", argon_err))
    })
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
#[instrument(name = "auth_service::verify_secret", skip_all, err(Display))]
pub fn verify_secret(stored_hash: &str, provided: &str) -> Result<bool, AppError> {
  let parsed_hash = PasswordHash::new(stored_hash).map_err(|parse_err| {
    error!(error = %parse_err, "Failed to parse stored hash string.");
    AppError::Internal(format!("Invalid stored hash format: {}", parse_err))
  })?;

  match Argon2::default().verify_password(provided.as_bytes(), &parsed_hash) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => Ok(false),
    Err(other) => {
      error!(error = %other, "Argon2 verification encountered an error.");
      Err(AppError::Internal(format!("Verification failed: {}", other)))
    }
  }
}

/// Mints a session for `user_id`. `impersonator_session_id` links it to the
/// administrator session it was minted from.
#[instrument(name = "auth_service::issue_session", skip_all, fields(%user_id), err(Display))]
pub async fn issue_session(
  store: &dyn Store,
  config: &AppConfig,
  user_id: Uuid,
  impersonator_session_id: Option<Uuid>,
  now: DateTime<Utc>,
) -> Result<(Session, SessionTokens), AppError> {
  let access_token = generate_token();
  let refresh_token = generate_token();
  let (access_ttl, refresh_ttl) = token_ttls(config)?;

  let session = store
    .insert_session(NewSession {
      user_id,
      access_token_hash: hash_token(&access_token),
      refresh_token_hash: hash_token(&refresh_token),
      access_expires_at: now + access_ttl,
      refresh_expires_at: now + refresh_ttl,
      impersonator_session_id,
    })
    .await?;
  debug!(session_id = %session.id, impersonated = session.is_impersonation(), "Session issued.");

  let tokens = SessionTokens {
    access_token,
    refresh_token,
    expires_at: session.access_expires_at,
    user_id,
  };
  Ok((session, tokens))
}

fn token_ttls(config: &AppConfig) -> Result<(chrono::Duration, chrono::Duration), AppError> {
  let access_ttl = chrono::Duration::from_std(config.access_token_ttl)
    .map_err(|e| AppError::Config(format!("Invalid access token TTL: {}", e)))?;
  let refresh_ttl = chrono::Duration::from_std(config.refresh_token_ttl)
    .map_err(|e| AppError::Config(format!("Invalid refresh token TTL: {}", e)))?;
  Ok((access_ttl, refresh_ttl))
}

/// The impersonator's session when it can still be refreshed.
async fn live_origin(store: &dyn Store, session: &Session, now: DateTime<Utc>) -> Result<Option<Session>, AppError> {
  let Some(origin_id) = session.impersonator_session_id else {
    return Ok(None);
  };
  let origin = store.find_session(origin_id).await?.filter(|o| o.is_refresh_valid(now));
  if origin.is_none() {
    warn!(session_id = %session.id, %origin_id, "Impersonator session ended; rejecting impersonated token.");
    return Err(AppError::Auth(
      "The administrator session behind this impersonation has ended. Sign in again.".to_string(),
    ));
  }
  Ok(origin)
}

/// Trades a refresh token for a new token pair. The old pair stops working.
///
/// An impersonated session never outlives the impersonator's refresh window.
#[instrument(name = "auth_service::refresh_session", skip_all, err(Display))]
pub async fn refresh_session(
  store: &dyn Store,
  config: &AppConfig,
  refresh_token: &str,
  now: DateTime<Utc>,
) -> Result<SessionTokens, AppError> {
  let refresh_token = refresh_token.trim();
  if refresh_token.is_empty() {
    return Err(AppError::Validation("refresh_token is required.".to_string()));
  }
  let presented_hash = hash_token(refresh_token);
  let session = store
    .find_session_by_refresh_hash(&presented_hash)
    .await?
    .filter(|s| s.is_refresh_valid(now))
    .ok_or_else(|| AppError::Auth("Refresh token is invalid or expired.".to_string()))?;
  let origin = live_origin(store, &session, now).await?;

  let (access_ttl, refresh_ttl) = token_ttls(config)?;
  let mut refresh_expires_at = now + refresh_ttl;
  if let Some(origin) = &origin {
    refresh_expires_at = refresh_expires_at.min(origin.refresh_expires_at);
  }
  let access_token = generate_token();
  let next_refresh_token = generate_token();
  let rotation = SessionRotation {
    access_token_hash: hash_token(&access_token),
    refresh_token_hash: hash_token(&next_refresh_token),
    access_expires_at: (now + access_ttl).min(refresh_expires_at),
    refresh_expires_at,
  };
  // A concurrent refresh with the same token may have rotated it first.
  let rotated = store
    .rotate_session(session.id, &presented_hash, rotation)
    .await?
    .ok_or_else(|| AppError::Auth("Refresh token is invalid or expired.".to_string()))?;
  info!(session_id = %rotated.id, impersonated = rotated.is_impersonation(), "Session refreshed.");

  Ok(SessionTokens {
    access_token,
    refresh_token: next_refresh_token,
    expires_at: rotated.access_expires_at,
    user_id: rotated.user_id,
  })
}

/// The caller behind a bearer token.
#[derive(Debug, Clone)]
pub struct Principal {
  pub user: User,
  pub roles: RoleSet,
  pub session: Session,
}

impl Principal {
  pub fn is_impersonated(&self) -> bool {
    self.session.is_impersonation()
  }
}

/// Resolves a bearer token to its user. Any failure is `AppError::Auth`.
///
/// An impersonated session is rejected once the impersonator's own session is
/// revoked or can no longer be refreshed.
#[instrument(name = "auth_service::authenticate", skip_all, err(Display))]
pub async fn authenticate(store: &dyn Store, token: &str, now: DateTime<Utc>) -> Result<Principal, AppError> {
  if token.is_empty() {
    return Err(AppError::Auth("Missing bearer token.".to_string()));
  }
  let session = store
    .find_session_by_access_hash(&hash_token(token))
    .await?
    .ok_or_else(|| AppError::Auth("Invalid session token.".to_string()))?;
  if !session.is_access_valid(now) {
    return Err(AppError::Auth("Session expired or revoked.".to_string()));
  }

  live_origin(store, &session, now).await?;

  let user = store
    .find_user(session.user_id)
    .await?
    .ok_or_else(|| AppError::Auth("Session user no longer exists.".to_string()))?;
  let roles = store.roles_for(user.id).await?;
  Ok(Principal { user, roles, session })
}
