// homeworks/src/services/policy.rs

use crate::errors::AppError;
use std::str::FromStr;
use tracing::warn;

/// What an integration reports when its upstream is unreachable.
///
/// `Allow` keeps the user moving with a permissive result, `Deny` surfaces an upstream error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnUnavailable {
  Allow,
  Deny,
}

impl FromStr for OnUnavailable {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self, AppError> {
    match s.trim().to_ascii_lowercase().as_str() {
      "allow" => Ok(Self::Allow),
      "deny" => Ok(Self::Deny),
      other => Err(AppError::Config(format!("Invalid on-unavailable policy '{}'", other))),
    }
  }
}

impl OnUnavailable {
  /// Applies the policy to a failed upstream call.
  pub fn resolve<T>(self, integration: &str, reason: &str, permissive: impl FnOnce() -> T) -> Result<T, AppError> {
    match self {
      OnUnavailable::Allow => {
        warn!(%integration, %reason, "Upstream unavailable; failing open.");
        Ok(permissive())
      }
      OnUnavailable::Deny => {
        warn!(%integration, %reason, "Upstream unavailable; failing closed.");
        Err(AppError::Upstream(format!("{} unavailable: {}", integration, reason)))
      }
    }
  }
}
