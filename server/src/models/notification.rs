// homeworks/src/models/notification.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
  pub id: Uuid,
  pub recipient_id: Uuid,
  pub title: String,
  pub body: String,
  pub link: Option<String>,
  pub kind: String,
  pub read_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewNotification {
  pub recipient_id: Uuid,
  pub title: String,
  pub body: String,
  pub link: Option<String>,
  pub kind: String,
}
