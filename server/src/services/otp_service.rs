// homeworks/src/services/otp_service.rs

//! One-time codes: five digits, short expiry, rate limited per phone, single use.

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::otp::{OtpPurpose, MAX_FAILED_ATTEMPTS};
use crate::services::auth_service::{hash_secret, verify_secret};
use crate::services::phone::parse_phone;
use crate::services::sms::SmsSender;
use crate::store::Store;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{info, instrument, warn};

pub const CODE_LEN: usize = 5;

pub fn generate_code() -> String {
  rand::thread_rng().gen_range(10000..=99999u32).to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct OtpDispatch {
  pub phone: String,
  pub expires_at: DateTime<Utc>,
}

fn chrono_secs(d: std::time::Duration) -> chrono::Duration {
  chrono::Duration::seconds(d.as_secs() as i64)
}

/// Phones allowed to receive codes for `purpose`.
fn check_recipient(config: &AppConfig, phone: &str, purpose: OtpPurpose) -> Result<(), AppError> {
  if purpose != OtpPurpose::SensitiveAction {
    return Ok(());
  }
  let ceo_phone = config
    .ceo_phone
    .as_deref()
    .map(parse_phone)
    .transpose()?
    .ok_or_else(|| AppError::Forbidden("Sensitive actions are not enabled.".to_string()))?;
  if ceo_phone != phone {
    return Err(AppError::Forbidden(
      "Sensitive-action codes are only sent to the CEO's phone.".to_string(),
    ));
  }
  Ok(())
}

async fn check_rate_limit(
  store: &dyn Store,
  config: &AppConfig,
  phone: &str,
  now: DateTime<Utc>,
) -> Result<(), AppError> {
  if let Some(last) = store.last_otp_sent_at(phone).await? {
    let wait = last + chrono_secs(config.otp_cooldown) - now;
    if wait > chrono::Duration::zero() {
      return Err(AppError::RateLimited(format!(
        "A code was just sent. Try again in {} seconds.",
        wait.num_seconds().max(1)
      )));
    }
  }
  let sent_last_hour = store.count_otps_since(phone, now - chrono::Duration::hours(1)).await?;
  if sent_last_hour >= i64::from(config.otp_max_per_hour) {
    return Err(AppError::RateLimited(
      "Too many codes requested for this number. Try again later.".to_string(),
    ));
  }
  Ok(())
}

#[instrument(name = "otp_service::send", skip_all, fields(%purpose), err(Display))]
pub async fn send_otp(
  store: &dyn Store,
  sms: &dyn SmsSender,
  config: &AppConfig,
  raw_phone: &str,
  purpose: OtpPurpose,
  now: DateTime<Utc>,
) -> Result<OtpDispatch, AppError> {
  let phone = parse_phone(raw_phone)?;
  check_recipient(config, &phone, purpose)?;
  check_rate_limit(store, config, &phone, now).await?;

  let code = generate_code();
  let expires_at = now + chrono_secs(config.otp_ttl);
  let otp = store.insert_otp(&phone, purpose, hash_secret(&code)?, now, expires_at).await?;

  let message = format!("Homeworks verification code: {}", code);
  if let Err(err) = sms.send(&phone, &message).await {
    // Undelivered codes must not count towards the cooldown or hourly cap.
    store.delete_otp(otp.id).await?;
    return Err(err);
  }
  info!(%phone, "Verification code sent.");
  Ok(OtpDispatch { phone, expires_at })
}

/// Consumes the newest pending code for the phone. Returns the normalised phone.
#[instrument(name = "otp_service::verify", skip_all, fields(%purpose), err(Display))]
pub async fn verify_otp(
  store: &dyn Store,
  raw_phone: &str,
  code: &str,
  purpose: OtpPurpose,
  now: DateTime<Utc>,
) -> Result<String, AppError> {
  let phone = parse_phone(raw_phone)?;
  let code = crate::services::phone::normalize_digits(code.trim());
  if code.len() != CODE_LEN || !code.bytes().all(|b| b.is_ascii_digit()) {
    return Err(AppError::Validation(format!("Code must be {} digits.", CODE_LEN)));
  }

  let rejected = || AppError::Auth("Code is invalid or expired.".to_string());
  let exhausted = || AppError::RateLimited("Too many incorrect attempts. Request a new code.".to_string());
  let pending = store.latest_pending_otp(&phone, purpose, now).await?.ok_or_else(rejected)?;
  if pending.is_exhausted() {
    return Err(exhausted());
  }
  if !verify_secret(&pending.code_hash, &code)? {
    let attempts = store.record_otp_failure(pending.id).await?;
    warn!(%phone, attempts, "Verification code mismatch.");
    if attempts >= MAX_FAILED_ATTEMPTS {
      return Err(exhausted());
    }
    return Err(rejected());
  }
  // A concurrent verification may have consumed it first.
  if !store.consume_otp(pending.id, now).await? {
    return Err(rejected());
  }
  info!(%phone, "Verification code accepted.");
  Ok(phone)
}
