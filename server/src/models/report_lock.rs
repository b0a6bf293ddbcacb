// homeworks/src/models/report_lock.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Closes one day's report of an order for editing. (order_id, report_date) is unique.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReportLock {
  pub order_id: Uuid,
  pub report_date: NaiveDate,
  pub locked_by: Uuid,
  pub locked_at: DateTime<Utc>,
}
