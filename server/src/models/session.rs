// homeworks/src/models/session.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A signed-in session. Tokens are only ever stored as SHA-256 digests.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
  pub id: Uuid,
  pub user_id: Uuid,
  pub access_token_hash: String,
  pub refresh_token_hash: String,
  pub access_expires_at: DateTime<Utc>,
  pub refresh_expires_at: DateTime<Utc>,
  /// Set when an administrator minted this session to act as `user_id`.
  pub impersonator_session_id: Option<Uuid>,
  pub revoked: bool,
  pub created_at: DateTime<Utc>,
}

impl Session {
  pub fn is_access_valid(&self, now: DateTime<Utc>) -> bool {
    !self.revoked && self.access_expires_at > now
  }

  /// Whether the session can still be refreshed; an impersonation only lives as long as this
  /// holds for the impersonator's session.
  pub fn is_refresh_valid(&self, now: DateTime<Utc>) -> bool {
    !self.revoked && self.refresh_expires_at > now
  }

  pub fn is_impersonation(&self) -> bool {
    self.impersonator_session_id.is_some()
  }
}

#[derive(Debug, Clone)]
pub struct NewSession {
  pub user_id: Uuid,
  pub access_token_hash: String,
  pub refresh_token_hash: String,
  pub access_expires_at: DateTime<Utc>,
  pub refresh_expires_at: DateTime<Utc>,
  pub impersonator_session_id: Option<Uuid>,
}

/// New token digests and expiries written by a refresh.
#[derive(Debug, Clone)]
pub struct SessionRotation {
  pub access_token_hash: String,
  pub refresh_token_hash: String,
  pub access_expires_at: DateTime<Utc>,
  pub refresh_expires_at: DateTime<Utc>,
}

/// Plain tokens handed to the client once, at issue time.
#[derive(Debug, Clone, Serialize)]
pub struct SessionTokens {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_at: DateTime<Utc>,
  pub user_id: Uuid,
}
