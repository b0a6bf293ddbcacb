// homeworks/src/models/module.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A configurable service module offered to customers. Deleting one is OTP-gated.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Module {
  pub id: Uuid,
  pub name: String,
  pub created_at: DateTime<Utc>,
}

/// One saved revision of a module's configuration. Versions count up from 1 per module.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ModuleVersion {
  pub id: Uuid,
  pub module_id: Uuid,
  pub version: i32,
  pub content: serde_json::Value,
  pub saved_by: Uuid,
  pub created_at: DateTime<Utc>,
}
