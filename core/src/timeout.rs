// stagehand/src/timeout.rs

//! Race a future against a timer.

use std::future::Future;
use std::time::Duration;
use tracing::{event, Level};

/// Resolves to `Some(output)` if `fut` finishes within `limit`, `None` otherwise.
///
/// The losing future is dropped.
pub async fn with_timeout<F>(limit: Duration, fut: F) -> Option<F::Output>
where
  F: Future,
{
  match tokio::time::timeout(limit, fut).await {
    Ok(output) => Some(output),
    Err(_) => {
      event!(Level::DEBUG, limit_ms = limit.as_millis() as u64, "Future lost the race against its timer.");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn fast_future_wins() {
    let out = with_timeout(Duration::from_millis(200), async { 7 }).await;
    assert_eq!(out, Some(7));
  }

  #[tokio::test]
  async fn slow_future_loses() {
    let out = with_timeout(Duration::from_millis(10), async {
      tokio::time::sleep(Duration::from_millis(500)).await;
      7
    })
    .await;
    assert_eq!(out, None);
  }
}
