// homeworks/src/models/audit.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

pub const IMPERSONATION_START: &str = "impersonation.start";
pub const ORDER_ARCHIVED: &str = "order.archived";
pub const MODULE_DELETED: &str = "module.deleted";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditEntry {
  pub id: Uuid,
  pub actor_id: Uuid,
  pub action: String,
  pub subject_id: Option<Uuid>,
  pub detail: serde_json::Value,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
  pub actor_id: Uuid,
  pub action: &'static str,
  pub subject_id: Option<Uuid>,
  pub detail: serde_json::Value,
}
