// homeworks/src/services/optimistic.rs

//! Apply local state, attempt the remote commit, restore the snapshot on failure.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::future::Future;
use tracing::debug;

/// A locally held value that is changed ahead of a remote commit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OptimisticToggle<T: Clone> {
  value: T,
}

impl<T: Clone> OptimisticToggle<T> {
  pub fn new(value: T) -> Self {
    Self { value }
  }

  pub fn get(&self) -> &T {
    &self.value
  }

  /// Sets `next` immediately and awaits `commit`. On `Err` the previous value is restored.
  pub async fn apply<F, R, E>(&mut self, next: T, commit: F) -> Result<R, E>
  where
    F: Future<Output = Result<R, E>>,
  {
    let snapshot = std::mem::replace(&mut self.value, next);
    match commit.await {
      Ok(r) => Ok(r),
      Err(e) => {
        debug!("Commit failed; restoring previous value.");
        self.value = snapshot;
        Err(e)
      }
    }
  }
}

/// Per-order view of which report dates are locked, owned by whoever edits the reports.
#[derive(Debug, Clone, Default)]
pub struct ReportLockBook {
  locked: OptimisticToggle<BTreeMap<NaiveDate, bool>>,
}

impl ReportLockBook {
  pub fn from_dates(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
    Self {
      locked: OptimisticToggle::new(dates.into_iter().map(|d| (d, true)).collect()),
    }
  }

  pub fn is_locked(&self, date: NaiveDate) -> bool {
    self.locked.get().get(&date).copied().unwrap_or(false)
  }

  /// Flips `date` locally, then runs `commit(new_state)`. The flip is undone if the commit fails.
  pub async fn toggle<F, Fut, E>(&mut self, date: NaiveDate, commit: F) -> Result<bool, E>
  where
    F: FnOnce(bool) -> Fut,
    Fut: Future<Output = Result<(), E>>,
  {
    let target = !self.is_locked(date);
    let mut next = self.locked.get().clone();
    next.insert(date, target);
    self.locked.apply(next, commit(target)).await.map(|_| target)
  }
}
