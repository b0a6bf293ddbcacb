// homeworks/src/services/payment_gateway.rs

//! Hosted payment gateway: payment requests, callback verification, and the
//! HTML page that sends the browser back into the app.

use crate::config::AppConfig;
use crate::errors::AppError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

// Gateway result codes: 100 = success, 101 = already verified.
const CODE_OK: i64 = 100;
const CODE_ALREADY_VERIFIED: i64 = 101;

#[derive(Serialize)]
struct PaymentRequestBody<'a> {
  merchant_id: &'a str,
  amount: i64,
  description: &'a str,
  callback_url: &'a str,
}

#[derive(Serialize)]
struct VerifyRequestBody<'a> {
  merchant_id: &'a str,
  amount: i64,
  authority: &'a str,
}

#[derive(Deserialize, Default)]
struct GatewayData {
  code: Option<i64>,
  authority: Option<String>,
  ref_id: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct GatewayResponse {
  #[serde(default)]
  data: Option<GatewayData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
  pub ref_id: Option<String>,
}

pub struct PaymentGateway {
  client: Client,
  request_url: Option<String>,
  verify_url: Option<String>,
  start_url: Option<String>,
  merchant_id: Option<String>,
}

fn not_configured(what: &str) -> AppError {
  AppError::Config(format!("Payment gateway {} is not configured", what))
}

impl PaymentGateway {
  pub fn from_config(client: Client, config: &AppConfig) -> Self {
    Self {
      client,
      request_url: config.payment_request_url.clone(),
      verify_url: config.payment_verify_url.clone(),
      start_url: config.payment_start_url.clone(),
      merchant_id: config.payment_merchant_id.clone(),
    }
  }

  fn merchant_id(&self) -> Result<&str, AppError> {
    self.merchant_id.as_deref().ok_or_else(|| not_configured("merchant id"))
  }

  async fn post(&self, url: &str, body: &impl Serialize) -> Result<GatewayData, AppError> {
    let response = self.client.post(url).json(body).send().await?;
    let status = response.status();
    let parsed: GatewayResponse = response
      .json()
      .await
      .map_err(|e| AppError::Upstream(format!("Gateway answered HTTP {} with unreadable body: {}", status, e)))?;
    Ok(parsed.data.unwrap_or_default())
  }

  /// Opens a payment and returns the gateway authority for it.
  #[instrument(name = "payment_gateway::request", skip(self, description), err(Display))]
  pub async fn request(&self, amount: i64, description: &str, callback_url: &str) -> Result<String, AppError> {
    let url = self.request_url.as_deref().ok_or_else(|| not_configured("request URL"))?;
    let data = self
      .post(
        url,
        &PaymentRequestBody {
          merchant_id: self.merchant_id()?,
          amount,
          description,
          callback_url,
        },
      )
      .await?;
    match (data.code, data.authority) {
      (Some(CODE_OK), Some(authority)) => Ok(authority),
      (code, _) => Err(AppError::Upstream(format!("Gateway refused payment request (code {:?})", code))),
    }
  }

  pub fn start_url(&self, authority: &str) -> Result<String, AppError> {
    let base = self.start_url.as_deref().ok_or_else(|| not_configured("start URL"))?;
    Ok(format!("{}/{}", base.trim_end_matches('/'), authority))
  }

  #[instrument(name = "payment_gateway::verify", skip(self), err(Display))]
  pub async fn verify(&self, authority: &str, amount: i64) -> Result<VerifiedPayment, AppError> {
    let url = self.verify_url.as_deref().ok_or_else(|| not_configured("verify URL"))?;
    let data = self
      .post(
        url,
        &VerifyRequestBody {
          merchant_id: self.merchant_id()?,
          amount,
          authority,
        },
      )
      .await?;
    match data.code {
      Some(CODE_OK) | Some(CODE_ALREADY_VERIFIED) => {
        let ref_id = data.ref_id.map(|v| match v {
          serde_json::Value::String(s) => s,
          other => other.to_string(),
        });
        info!(?ref_id, "Payment verified by gateway.");
        Ok(VerifiedPayment { ref_id })
      }
      code => {
        warn!(?code, "Gateway declined verification.");
        Err(AppError::Upstream(format!("Gateway declined verification (code {:?})", code)))
      }
    }
  }
}

fn escape_html_attr(raw: &str) -> String {
  raw
    .replace('&', "&amp;")
    .replace('"', "&quot;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
}

/// Minimal page that moves the browser to `target`, with a meta-refresh and a
/// link for clients without scripts.
pub fn redirect_page(target: &str) -> String {
  let js_target = serde_json::to_string(target)
    .unwrap_or_else(|_| "\"/\"".to_string())
    .replace("</", "<\\/");
  let attr_target = escape_html_attr(target);
  format!(
    "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\
     <meta http-equiv=\"refresh\" content=\"0;url={attr}\">\
     <title>Redirecting…</title></head>\
     <body><script>window.location.replace({js});</script>\
     <a href=\"{attr}\">Continue</a></body></html>",
    attr = attr_target,
    js = js_target
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn redirect_page_embeds_target_safely() {
    let page = redirect_page("https://app.example/orders/1?payment=ok&x=\"</script>");
    assert!(page.contains("window.location.replace(\"https://app.example/orders/1?payment=ok&x=\\\"<\\/script>\");"));
    assert!(page.contains("url=https://app.example/orders/1?payment=ok&amp;x=&quot;&lt;/script&gt;"));
    assert!(!page.contains("</script>\""));
  }

  #[test]
  fn start_url_joins_authority() {
    let mut config = AppConfig::default();
    config.payment_start_url = Some("https://gateway.example/pg/StartPay/".into());
    let gateway = PaymentGateway::from_config(Client::new(), &config);
    assert_eq!(
      gateway.start_url("A000123").unwrap(),
      "https://gateway.example/pg/StartPay/A000123"
    );
  }

  #[tokio::test]
  async fn unconfigured_gateway_is_a_config_error() {
    let gateway = PaymentGateway::from_config(Client::new(), &AppConfig::default());
    assert!(matches!(gateway.verify("A1", 1000).await, Err(AppError::Config(_))));
    assert!(matches!(gateway.request(1000, "x", "http://cb").await, Err(AppError::Config(_))));
  }
}
