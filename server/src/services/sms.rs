// homeworks/src/services/sms.rs

//! Outbound SMS. Production posts to an HTTP SMS gateway; without one
//! configured, messages are kept in an outbox and logged.

use crate::errors::AppError;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, info, instrument};

#[async_trait]
pub trait SmsSender: Send + Sync {
  async fn send(&self, phone: &str, message: &str) -> Result<(), AppError>;
}

#[derive(Serialize)]
struct SmsRequest<'a> {
  mobile: &'a str,
  message: &'a str,
}

pub struct HttpSmsSender {
  client: Client,
  url: String,
  api_key: Option<String>,
}

impl HttpSmsSender {
  pub fn new(client: Client, url: &str, api_key: Option<String>) -> Self {
    Self {
      client,
      url: url.to_string(),
      api_key,
    }
  }
}

#[async_trait]
impl SmsSender for HttpSmsSender {
  #[instrument(name = "sms::http_send", skip(self, message), err(Display))]
  async fn send(&self, phone: &str, message: &str) -> Result<(), AppError> {
    let mut request = self.client.post(&self.url).json(&SmsRequest { mobile: phone, message });
    if let Some(key) = &self.api_key {
      request = request.header("x-api-key", key);
    }
    let response = request.send().await?;
    if !response.status().is_success() {
      return Err(AppError::Upstream(format!("SMS gateway answered HTTP {}", response.status())));
    }
    info!("SMS handed to gateway.");
    Ok(())
  }
}

/// Messages the outbox retains before dropping the oldest.
pub const OUTBOX_CAPACITY: usize = 100;

/// Masks every digit so codes never reach the log.
fn redact_digits(message: &str) -> String {
  message.chars().map(|c| if c.is_ascii_digit() { '*' } else { c }).collect()
}

/// Keeps the most recent messages in memory. Used when no gateway is configured and in tests.
pub struct OutboxSmsSender {
  sent: Mutex<VecDeque<(String, String)>>,
  capacity: usize,
}

impl Default for OutboxSmsSender {
  fn default() -> Self {
    Self::with_capacity(OUTBOX_CAPACITY)
  }
}

impl OutboxSmsSender {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      sent: Mutex::new(VecDeque::with_capacity(capacity)),
      capacity: capacity.max(1),
    }
  }

  pub fn len(&self) -> usize {
    self.sent.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.sent.lock().is_empty()
  }

  pub fn messages_to(&self, phone: &str) -> Vec<String> {
    self
      .sent
      .lock()
      .iter()
      .filter(|(to, _)| to == phone)
      .map(|(_, body)| body.clone())
      .collect()
  }

  /// Trailing digit run of the newest message to `phone`.
  pub fn last_code_for(&self, phone: &str) -> Option<String> {
    let last = self.messages_to(phone).pop()?;
    let code: String = last
      .chars()
      .rev()
      .skip_while(|c| !c.is_ascii_digit())
      .take_while(|c| c.is_ascii_digit())
      .collect::<Vec<_>>()
      .into_iter()
      .rev()
      .collect();
    (!code.is_empty()).then_some(code)
  }
}

#[async_trait]
impl SmsSender for OutboxSmsSender {
  async fn send(&self, phone: &str, message: &str) -> Result<(), AppError> {
    debug!(%phone, message = %redact_digits(message), "SMS kept in outbox (no gateway configured).");
    let mut sent = self.sent.lock();
    if sent.len() >= self.capacity {
      sent.pop_front();
    }
    sent.push_back((phone.to_string(), message.to_string()));
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn outbox_extracts_trailing_code() {
    let outbox = OutboxSmsSender::new();
    outbox.send("09120000001", "Your code: 12345").await.unwrap();
    outbox.send("09120000001", "Your code: 67890.").await.unwrap();
    outbox.send("09120000002", "Your code: 11111").await.unwrap();
    assert_eq!(outbox.last_code_for("09120000001").as_deref(), Some("67890"));
    assert_eq!(outbox.messages_to("09120000002").len(), 1);
    assert_eq!(outbox.last_code_for("09129999999"), None);
  }

  #[tokio::test]
  async fn outbox_drops_the_oldest_message_when_full() {
    let outbox = OutboxSmsSender::with_capacity(2);
    outbox.send("09120000001", "Your code: 11111").await.unwrap();
    outbox.send("09120000002", "Your code: 22222").await.unwrap();
    outbox.send("09120000003", "Your code: 33333").await.unwrap();
    assert_eq!(outbox.len(), 2);
    assert!(outbox.messages_to("09120000001").is_empty());
    assert_eq!(outbox.last_code_for("09120000003").as_deref(), Some("33333"));
  }

  #[test]
  fn logged_messages_hide_digits() {
    assert_eq!(redact_digits("Homeworks verification code: 48213"), "Homeworks verification code: *****");
  }
}
