// homeworks/src/services/moderation.rs

//! Image moderation through a hosted classifier. Upload flows ask before
//! accepting an image; what happens when the classifier is down is set by policy.

use crate::errors::AppError;
use crate::services::policy::OnUnavailable;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationVerdict {
  pub allowed: bool,
  /// False when the classifier was not consulted.
  pub checked: bool,
  pub categories: Vec<String>,
}

impl ModerationVerdict {
  fn unchecked() -> Self {
    Self {
      allowed: true,
      checked: false,
      categories: Vec::new(),
    }
  }
}

#[derive(Serialize)]
struct ModerationRequest<'a> {
  image_url: &'a str,
}

#[derive(Deserialize)]
struct ModerationResponse {
  flagged: bool,
  #[serde(default)]
  categories: Vec<String>,
}

pub struct ImageModerator {
  client: Client,
  url: Option<String>,
  api_key: Option<String>,
  policy: OnUnavailable,
}

impl ImageModerator {
  pub fn new(client: Client, url: Option<String>, api_key: Option<String>, policy: OnUnavailable) -> Self {
    Self {
      client,
      url,
      api_key,
      policy,
    }
  }

  async fn classify(&self, url: &str, image_url: &str) -> Result<ModerationVerdict, AppError> {
    let mut request = self.client.post(url).json(&ModerationRequest { image_url });
    if let Some(key) = &self.api_key {
      request = request.bearer_auth(key);
    }
    let response = request.send().await?;
    if !response.status().is_success() {
      return Err(AppError::Upstream(format!("Moderation answered HTTP {}", response.status())));
    }
    let body: ModerationResponse = response.json().await?;
    Ok(ModerationVerdict {
      allowed: !body.flagged,
      checked: true,
      categories: body.categories,
    })
  }

  #[instrument(name = "moderation::check", skip(self), err(Display))]
  pub async fn check(&self, image_url: &str) -> Result<ModerationVerdict, AppError> {
    if !(image_url.starts_with("https://") || image_url.starts_with("http://")) {
      return Err(AppError::Validation("image_url must be an http(s) URL.".to_string()));
    }
    let Some(url) = &self.url else {
      return self.policy.resolve("moderation", "not configured", ModerationVerdict::unchecked);
    };
    match self.classify(url, image_url).await {
      Ok(verdict) => {
        info!(allowed = verdict.allowed, "Image classified.");
        Ok(verdict)
      }
      Err(e) => self.policy.resolve("moderation", &e.to_string(), ModerationVerdict::unchecked),
    }
  }
}
