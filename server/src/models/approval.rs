// homeworks/src/models/approval.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// One required sign-off slot of an order, tied to a role tag.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Approval {
  pub id: Uuid,
  pub order_id: Uuid,
  pub approver_role: String,
  pub approver_user_id: Option<Uuid>,
  pub approved_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
}

impl Approval {
  pub fn is_approved(&self) -> bool {
    self.approved_at.is_some()
  }
}

/// Result of recording a sign-off.
#[derive(Debug, Clone)]
pub enum ApprovalOutcome {
  Recorded(Approval),
  /// No pending slot for that role: nothing was written.
  NoPendingSlot,
}

impl ApprovalOutcome {
  pub fn as_str(&self) -> &'static str {
    match self {
      ApprovalOutcome::Recorded(_) => "recorded",
      ApprovalOutcome::NoPendingSlot => "no_pending_slot",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ApprovalProgress {
  pub approved: usize,
  pub total: usize,
}

impl ApprovalProgress {
  pub fn from_ledger(rows: &[Approval]) -> Self {
    Self {
      approved: rows.iter().filter(|a| a.is_approved()).count(),
      total: rows.len(),
    }
  }

  /// `approved / total`, `0.0` for an empty ledger.
  pub fn ratio(&self) -> f64 {
    if self.total == 0 {
      0.0
    } else {
      self.approved as f64 / self.total as f64
    }
  }

  pub fn percent(&self) -> u8 {
    (self.ratio() * 100.0).round() as u8
  }

  pub fn is_complete(&self) -> bool {
    self.total > 0 && self.approved == self.total
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn slot(role: &str, approved: bool) -> Approval {
    let now = Utc::now();
    Approval {
      id: Uuid::new_v4(),
      order_id: Uuid::nil(),
      approver_role: role.to_string(),
      approver_user_id: approved.then(Uuid::new_v4),
      approved_at: approved.then_some(now),
      created_at: now,
    }
  }

  #[test]
  fn half_approved_ledger_is_fifty_percent() {
    let ledger = vec![slot("sales_manager", true), slot("ceo", false)];
    let progress = ApprovalProgress::from_ledger(&ledger);
    assert_eq!(progress, ApprovalProgress { approved: 1, total: 2 });
    assert_eq!(progress.percent(), 50);
    assert!(!progress.is_complete());
  }

  #[test]
  fn complete_only_when_every_slot_is_approved() {
    let ledger = vec![slot("sales_manager", true), slot("ceo", true)];
    let progress = ApprovalProgress::from_ledger(&ledger);
    assert_eq!(progress.ratio(), 1.0);
    assert!(progress.is_complete());
  }

  #[test]
  fn empty_ledger_is_zero_and_never_complete() {
    let progress = ApprovalProgress::from_ledger(&[]);
    assert_eq!(progress.ratio(), 0.0);
    assert!(!progress.is_complete());
  }

  #[test]
  fn ratio_counts_approved_rows_over_all_rows() {
    for total in 1..=6usize {
      for approved in 0..=total {
        let ledger: Vec<_> = (0..total).map(|i| slot("r", i < approved)).collect();
        let progress = ApprovalProgress::from_ledger(&ledger);
        assert_eq!(progress.ratio(), approved as f64 / total as f64);
        assert_eq!(progress.is_complete(), approved == total);
      }
    }
  }
}
