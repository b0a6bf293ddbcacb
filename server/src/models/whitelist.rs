// homeworks/src/models/whitelist.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A phone number pre-approved to register under the listed roles.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WhitelistEntry {
  pub phone: String,
  pub allowed_roles: Vec<String>,
  pub notes: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWhitelistEntry {
  pub phone: String,
  pub allowed_roles: Vec<String>,
  pub notes: Option<String>,
}
