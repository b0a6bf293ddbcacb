// homeworks/src/models/order.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// Lifecycle of an order. The set is closed; a row never holds anything else.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType, Display, EnumString, EnumIter,
)]
#[sqlx(type_name = "order_status_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
  Draft,
  Pending,
  Approved,
  InProgress,
  Completed,
  Paid,
  Closed,
  Rejected,
}

impl OrderStatus {
  /// Statuses reachable from `self` in one step.
  pub fn next_statuses(self) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match self {
      Draft => &[Pending],
      Pending => &[Approved, Rejected],
      Approved => &[InProgress, Rejected],
      InProgress => &[Completed],
      Completed => &[Paid],
      Paid => &[Closed],
      Closed | Rejected => &[],
    }
  }

  pub fn can_transition_to(self, next: OrderStatus) -> bool {
    self.next_statuses().contains(&next)
  }

  pub fn is_terminal(self) -> bool {
    self.next_statuses().is_empty()
  }

  /// Display label for status badges.
  pub fn label(self) -> &'static str {
    match self {
      OrderStatus::Draft => "Draft",
      OrderStatus::Pending => "Awaiting approval",
      OrderStatus::Approved => "Approved",
      OrderStatus::InProgress => "In progress",
      OrderStatus::Completed => "Completed",
      OrderStatus::Paid => "Paid",
      OrderStatus::Closed => "Closed",
      OrderStatus::Rejected => "Rejected",
    }
  }

  pub fn badge_color(self) -> &'static str {
    match self {
      OrderStatus::Draft => "gray",
      OrderStatus::Pending => "amber",
      OrderStatus::Approved => "blue",
      OrderStatus::InProgress => "indigo",
      OrderStatus::Completed => "teal",
      OrderStatus::Paid => "green",
      OrderStatus::Closed => "slate",
      OrderStatus::Rejected => "red",
    }
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
  pub id: Uuid,
  pub code: String,
  pub customer_id: Uuid,
  pub service_id: Option<Uuid>,
  pub location: Option<String>,
  pub status: OrderStatus,
  pub payment_amount: i64,
  pub contractor_id: Option<Uuid>,
  pub archived: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
  pub customer_id: Uuid,
  pub service_id: Option<Uuid>,
  pub location: Option<String>,
  pub payment_amount: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
  /// Restrict to one customer's orders.
  pub customer_id: Option<Uuid>,
  pub include_archived: bool,
}

/// `ORD-<sequence>`.
pub fn service_code(sequence: i64) -> String {
  format!("ORD-{}", sequence)
}

#[cfg(test)]
mod tests {
  use super::*;
  use strum::IntoEnumIterator;

  #[test]
  fn lifecycle_follows_transition_table() {
    use OrderStatus::*;
    assert!(Draft.can_transition_to(Pending));
    assert!(Pending.can_transition_to(Approved));
    assert!(Pending.can_transition_to(Rejected));
    assert!(Approved.can_transition_to(InProgress));
    assert!(Approved.can_transition_to(Rejected));
    assert!(InProgress.can_transition_to(Completed));
    assert!(Completed.can_transition_to(Paid));
    assert!(Paid.can_transition_to(Closed));

    assert!(!Draft.can_transition_to(Approved));
    assert!(!Pending.can_transition_to(Paid));
    assert!(!Completed.can_transition_to(Rejected));
    assert!(!Closed.can_transition_to(Draft));
  }

  #[test]
  fn only_closed_and_rejected_are_terminal() {
    let terminal: Vec<_> = OrderStatus::iter().filter(|s| s.is_terminal()).collect();
    assert_eq!(terminal, vec![OrderStatus::Closed, OrderStatus::Rejected]);
  }

  #[test]
  fn no_status_transitions_into_draft_or_itself() {
    for status in OrderStatus::iter() {
      assert!(!status.can_transition_to(OrderStatus::Draft));
      assert!(!status.can_transition_to(status));
    }
  }

  #[test]
  fn status_strings_are_snake_case() {
    assert_eq!(OrderStatus::InProgress.to_string(), "in_progress");
    assert_eq!("in_progress".parse::<OrderStatus>().unwrap(), OrderStatus::InProgress);
    assert!("shipped".parse::<OrderStatus>().is_err());
    assert_eq!(serde_json::to_string(&OrderStatus::Paid).unwrap(), "\"paid\"");
  }

  #[test]
  fn codes_are_prefixed() {
    assert_eq!(service_code(1001), "ORD-1001");
  }
}
