// homeworks/src/models/payment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType, Display, EnumString)]
#[sqlx(type_name = "payment_status_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
  Initiated,
  Verified,
  Failed,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Payment {
  pub id: Uuid,
  pub order_id: Uuid,
  /// Gateway reference for the payment attempt.
  pub authority: String,
  pub amount: i64,
  pub status: PaymentStatus,
  pub ref_id: Option<String>,
  pub created_at: DateTime<Utc>,
}
