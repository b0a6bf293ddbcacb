// homeworks/src/models/otp.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType, Display, EnumString)]
#[sqlx(type_name = "otp_purpose_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OtpPurpose {
  Login,
  SensitiveAction,
}

pub const MAX_FAILED_ATTEMPTS: i32 = 5;

/// A sent one-time code. Only the argon2 hash of the digits is kept.
#[derive(Debug, Clone, FromRow)]
pub struct OtpCode {
  pub id: Uuid,
  pub phone: String,
  pub purpose: OtpPurpose,
  pub code_hash: String,
  pub expires_at: DateTime<Utc>,
  pub verified_at: Option<DateTime<Utc>>,
  pub failed_attempts: i32,
  pub created_at: DateTime<Utc>,
}

impl OtpCode {
  pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
    self.verified_at.is_none() && self.expires_at > now
  }

  /// Too many wrong guesses; the code can no longer be used even with the right digits.
  pub fn is_exhausted(&self) -> bool {
    self.failed_attempts >= MAX_FAILED_ATTEMPTS
  }
}
