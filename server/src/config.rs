// homeworks/src/config.rs

use crate::errors::{AppError, Result};
use crate::services::policy::OnUnavailable;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which persistence backend the server runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
  Postgres,
  Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub store: StoreKind,
  pub database_url: Option<String>,
  pub run_migrations: bool,
  pub app_base_url: String,
  /// Browser origins allowed by CORS. `*` allows any.
  pub allowed_origins: Vec<String>,

  // Auth
  pub ceo_phone: Option<String>,
  pub access_token_ttl: Duration,
  pub refresh_token_ttl: Duration,

  // OTP
  pub sms_api_url: Option<String>,
  pub sms_api_key: Option<String>,
  pub otp_ttl: Duration,
  pub otp_cooldown: Duration,
  pub otp_max_per_hour: u32,

  // Roles whose sign-off an order needs once submitted, in ledger order.
  pub approval_chain: Vec<String>,

  // Integrations
  pub geocode_url: String,
  pub geocode_timeout: Duration,
  pub geocode_policy: OnUnavailable,
  pub routing_api_url: Option<String>,
  pub routing_api_key: Option<String>,
  pub osrm_url: Option<String>,
  pub moderation_url: Option<String>,
  pub moderation_api_key: Option<String>,
  pub moderation_policy: OnUnavailable,
  pub push_relay_url: Option<String>,
  pub push_api_key: Option<String>,
  pub payment_request_url: Option<String>,
  pub payment_verify_url: Option<String>,
  pub payment_start_url: Option<String>,
  pub payment_merchant_id: Option<String>,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      server_host: "127.0.0.1".to_string(),
      server_port: 8080,
      store: StoreKind::Memory,
      database_url: None,
      run_migrations: false,
      app_base_url: "http://127.0.0.1:8080".to_string(),
      allowed_origins: vec!["*".to_string()],
      ceo_phone: None,
      access_token_ttl: Duration::from_secs(3600),
      refresh_token_ttl: Duration::from_secs(30 * 24 * 3600),
      sms_api_url: None,
      sms_api_key: None,
      otp_ttl: Duration::from_secs(90),
      otp_cooldown: Duration::from_secs(60),
      otp_max_per_hour: 5,
      approval_chain: vec!["sales_manager".to_string(), "ceo".to_string()],
      geocode_url: "https://nominatim.openstreetmap.org".to_string(),
      geocode_timeout: Duration::from_secs(9),
      geocode_policy: OnUnavailable::Allow,
      routing_api_url: None,
      routing_api_key: None,
      osrm_url: Some("https://router.project-osrm.org".to_string()),
      moderation_url: None,
      moderation_api_key: None,
      moderation_policy: OnUnavailable::Allow,
      push_relay_url: None,
      push_api_key: None,
      payment_request_url: None,
      payment_verify_url: None,
      payment_start_url: None,
      payment_merchant_id: None,
    }
  }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T>
where
  T::Err: std::fmt::Display,
{
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e)))
}

fn secs_var(name: &str, raw: &str) -> Result<Duration> {
  parse_var::<u64>(name, raw).map(Duration::from_secs)
}

/// Comma-separated origins such as `https://app.example.com,http://localhost:5173`, or `*`.
fn origins_var(raw: &str) -> Result<Vec<String>> {
  let origins: Vec<String> = raw
    .split(',')
    .map(|o| o.trim().trim_end_matches('/').to_string())
    .filter(|o| !o.is_empty())
    .collect();
  if origins.is_empty() {
    return Err(AppError::Config("ALLOWED_ORIGIN must name at least one origin".to_string()));
  }
  for origin in &origins {
    let scheme_ok = origin.starts_with("http://") || origin.starts_with("https://");
    if origin != "*" && (!scheme_ok || origin.contains(char::is_whitespace)) {
      return Err(AppError::Config(format!("Invalid ALLOWED_ORIGIN entry '{}'", origin)));
    }
  }
  Ok(origins)
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let get_env = |var_name: &str| env::var(var_name).ok().filter(|v| !v.trim().is_empty());
    let defaults = Self::default();

    let server_host = get_env("SERVER_HOST").unwrap_or(defaults.server_host);
    let server_port = match get_env("SERVER_PORT") {
      Some(raw) => parse_var::<u16>("SERVER_PORT", &raw)?,
      None => defaults.server_port,
    };

    let store = match get_env("STORE").as_deref().map(str::to_ascii_lowercase).as_deref() {
      None | Some("postgres") => StoreKind::Postgres,
      Some("memory") => StoreKind::Memory,
      Some(other) => return Err(AppError::Config(format!("Invalid STORE '{}'", other))),
    };
    let database_url = get_env("DATABASE_URL");
    if store == StoreKind::Postgres && database_url.is_none() {
      return Err(AppError::Config(
        "Missing environment variable 'DATABASE_URL' (or set STORE=memory)".to_string(),
      ));
    }
    let run_migrations = match get_env("RUN_MIGRATIONS") {
      Some(raw) => parse_var::<bool>("RUN_MIGRATIONS", &raw)?,
      None => false,
    };

    let app_base_url = get_env("APP_BASE_URL").unwrap_or_else(|| format!("http://{}:{}", server_host, server_port));

    let mut cfg = Self {
      server_host,
      server_port,
      store,
      database_url,
      run_migrations,
      app_base_url,
      ..defaults
    };

    if let Some(raw) = get_env("ALLOWED_ORIGIN") {
      cfg.allowed_origins = origins_var(&raw)?;
    }
    cfg.ceo_phone = get_env("CEO_PHONE");

    if let Some(raw) = get_env("ACCESS_TOKEN_TTL_SECS") {
      cfg.access_token_ttl = secs_var("ACCESS_TOKEN_TTL_SECS", &raw)?;
    }
    if let Some(raw) = get_env("REFRESH_TOKEN_TTL_SECS") {
      cfg.refresh_token_ttl = secs_var("REFRESH_TOKEN_TTL_SECS", &raw)?;
    }
    cfg.sms_api_url = get_env("SMS_API_URL");
    cfg.sms_api_key = get_env("SMS_API_KEY");
    if let Some(raw) = get_env("OTP_TTL_SECS") {
      cfg.otp_ttl = secs_var("OTP_TTL_SECS", &raw)?;
    }
    if let Some(raw) = get_env("OTP_COOLDOWN_SECS") {
      cfg.otp_cooldown = secs_var("OTP_COOLDOWN_SECS", &raw)?;
    }
    if let Some(raw) = get_env("OTP_MAX_PER_HOUR") {
      cfg.otp_max_per_hour = parse_var::<u32>("OTP_MAX_PER_HOUR", &raw)?;
    }

    if let Some(raw) = get_env("APPROVAL_CHAIN") {
      let chain: Vec<String> = raw
        .split(',')
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();
      if chain.is_empty() {
        return Err(AppError::Config("APPROVAL_CHAIN must name at least one role".to_string()));
      }
      cfg.approval_chain = chain;
    }

    if let Some(url) = get_env("GEOCODE_URL") {
      cfg.geocode_url = url;
    }
    if let Some(raw) = get_env("GEOCODE_TIMEOUT_SECS") {
      cfg.geocode_timeout = secs_var("GEOCODE_TIMEOUT_SECS", &raw)?;
    }
    if let Some(raw) = get_env("GEOCODE_ON_UNAVAILABLE") {
      cfg.geocode_policy = raw.parse()?;
    }
    cfg.routing_api_url = get_env("ROUTING_API_URL");
    cfg.routing_api_key = get_env("ROUTING_API_KEY");
    if let Some(url) = get_env("OSRM_URL") {
      cfg.osrm_url = Some(url);
    }
    cfg.moderation_url = get_env("MODERATION_URL");
    cfg.moderation_api_key = get_env("MODERATION_API_KEY");
    if let Some(raw) = get_env("MODERATION_ON_UNAVAILABLE") {
      cfg.moderation_policy = raw.parse()?;
    }
    cfg.push_relay_url = get_env("PUSH_RELAY_URL");
    cfg.push_api_key = get_env("PUSH_API_KEY");
    cfg.payment_request_url = get_env("PAYMENT_REQUEST_URL");
    cfg.payment_verify_url = get_env("PAYMENT_VERIFY_URL");
    cfg.payment_start_url = get_env("PAYMENT_START_URL");
    cfg.payment_merchant_id = get_env("PAYMENT_MERCHANT_ID");

    tracing::info!(store = ?cfg.store, approval_chain = ?cfg.approval_chain, "Application configuration loaded successfully.");
    Ok(cfg)
  }

  pub fn bind_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }
}
