// homeworks/src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
  pub id: Uuid,
  /// Normalised mobile number (`09` followed by nine digits).
  pub phone: String,
  pub full_name: Option<String>,
  pub created_at: DateTime<Utc>,
}

/// What anonymous visitors may see of a contractor. The phone number stays private.
#[derive(Debug, Clone, Serialize)]
pub struct PublicContractor {
  pub id: Uuid,
  pub display_name: String,
}

impl From<User> for PublicContractor {
  fn from(user: User) -> Self {
    let display_name = user
      .full_name
      .filter(|n| !n.trim().is_empty())
      .unwrap_or_else(|| "Contractor".to_string());
    Self { id: user.id, display_name }
  }
}
