// homeworks/src/models/daily_report.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A saved revision of one day's site report. Earlier versions are kept; a locked
/// date takes no new versions.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DailyReportVersion {
  pub id: Uuid,
  pub order_id: Uuid,
  pub report_date: NaiveDate,
  pub version: i32,
  pub content: serde_json::Value,
  pub author_id: Uuid,
  pub created_at: DateTime<Utc>,
}
