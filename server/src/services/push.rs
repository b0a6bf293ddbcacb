// homeworks/src/services/push.rs

//! Client for the third-party push provider. Recipients are addressed by
//! their user id, registered with the provider as the external user id.

use crate::errors::AppError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
  pub recipients: Vec<Uuid>,
  pub title: String,
  pub body: String,
  pub link: Option<String>,
}

pub struct PushRelay {
  client: Client,
  url: String,
  api_key: Option<String>,
}

impl PushRelay {
  pub fn new(client: Client, url: &str, api_key: Option<String>) -> Self {
    Self {
      client,
      url: url.to_string(),
      api_key,
    }
  }

  fn payload(message: &PushMessage) -> serde_json::Value {
    let ids: Vec<String> = message.recipients.iter().map(Uuid::to_string).collect();
    let mut payload = json!({
      "include_external_user_ids": ids,
      "headings": { "en": message.title },
      "contents": { "en": message.body },
    });
    if let Some(link) = &message.link {
      payload["url"] = json!(link);
    }
    payload
  }

  #[instrument(name = "push::send", skip_all, fields(recipients = message.recipients.len()), err(Display))]
  pub async fn send(&self, message: &PushMessage) -> Result<(), AppError> {
    if message.recipients.is_empty() {
      return Err(AppError::Validation("Push message has no recipients.".to_string()));
    }
    let mut request = self.client.post(&self.url).json(&Self::payload(message));
    if let Some(key) = &self.api_key {
      request = request.header(reqwest::header::AUTHORIZATION, format!("Basic {}", key));
    }
    let response = request.send().await?;
    if !response.status().is_success() {
      return Err(AppError::Upstream(format!("Push provider answered HTTP {}", response.status())));
    }
    debug!("Push delivered to provider.");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn payload_targets_external_ids_and_carries_link() {
    let id = Uuid::new_v4();
    let payload = PushRelay::payload(&PushMessage {
      recipients: vec![id],
      title: "Order approved".into(),
      body: "ORD-1001 was approved".into(),
      link: Some("/orders/1".into()),
    });
    assert_eq!(payload["include_external_user_ids"][0], id.to_string());
    assert_eq!(payload["headings"]["en"], "Order approved");
    assert_eq!(payload["url"], "/orders/1");
  }

  #[test]
  fn payload_omits_missing_link() {
    let payload = PushRelay::payload(&PushMessage {
      recipients: vec![Uuid::new_v4()],
      title: "t".into(),
      body: "b".into(),
      link: None,
    });
    assert!(payload.get("url").is_none());
  }
}
