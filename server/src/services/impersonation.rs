// homeworks/src/services/impersonation.rs

//! The client side of "login as user": an owned value that holds the
//! administrator's own tokens while a target user's session is active.

use crate::models::session::SessionTokens;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ImpersonationSession {
  original: SessionTokens,
  active: SessionTokens,
  started_at: DateTime<Utc>,
}

impl ImpersonationSession {
  /// Starts acting as `impersonated.user_id`, keeping `original` aside.
  pub fn begin(original: SessionTokens, impersonated: SessionTokens, started_at: DateTime<Utc>) -> Self {
    Self {
      original,
      active: impersonated,
      started_at,
    }
  }

  /// Tokens to send with requests while impersonating.
  pub fn active_tokens(&self) -> &SessionTokens {
    &self.active
  }

  /// Swaps in a refreshed pair for the impersonated user.
  pub fn replace_active(&mut self, refreshed: SessionTokens) {
    self.active = refreshed;
  }

  pub fn target_user_id(&self) -> Uuid {
    self.active.user_id
  }

  pub fn administrator_id(&self) -> Uuid {
    self.original.user_id
  }

  pub fn started_at(&self) -> DateTime<Utc> {
    self.started_at
  }

  /// "Return to admin": ends the impersonation and hands back the original tokens.
  pub fn end(self) -> SessionTokens {
    self.original
  }
}
