// homeworks/src/state.rs

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::services::geocode::Geocoder;
use crate::services::moderation::ImageModerator;
use crate::services::notifier::Notifier;
use crate::services::payment_gateway::PaymentGateway;
use crate::services::push::PushRelay;
use crate::services::routing::RoutePlanner;
use crate::services::sms::{HttpSmsSender, OutboxSmsSender, SmsSender};
use crate::store::Store;
use stagehand::Registry;
use std::sync::Arc;
use std::time::Duration;

const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn Store>,
  pub registry: Arc<Registry<AppError>>,
  pub config: Arc<AppConfig>,
  pub notifier: Notifier,
  pub sms: Arc<dyn SmsSender>,
  pub push: Option<Arc<PushRelay>>,
  pub geocoder: Arc<Geocoder>,
  pub router: Arc<RoutePlanner>,
  pub moderator: Arc<ImageModerator>,
  pub payments: Arc<PaymentGateway>,
}

impl AppState {
  /// Builds the state with the SMS sender the configuration asks for and registers every pipeline.
  pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Result<Self> {
    let http = Self::http_client()?;
    let sms: Arc<dyn SmsSender> = match &config.sms_api_url {
      Some(url) => Arc::new(HttpSmsSender::new(http.clone(), url, config.sms_api_key.clone())),
      None => {
        tracing::warn!("SMS_API_URL not set; verification codes stay in the in-process outbox.");
        Arc::new(OutboxSmsSender::new())
      }
    };
    Ok(Self::assemble(config, store, sms, http))
  }

  /// Same as `new` with an explicit SMS sender.
  pub fn with_sms(config: AppConfig, store: Arc<dyn Store>, sms: Arc<dyn SmsSender>) -> Result<Self> {
    Ok(Self::assemble(config, store, sms, Self::http_client()?))
  }

  fn assemble(config: AppConfig, store: Arc<dyn Store>, sms: Arc<dyn SmsSender>, http: reqwest::Client) -> Self {
    let push = config
      .push_relay_url
      .as_deref()
      .map(|url| Arc::new(PushRelay::new(http.clone(), url, config.push_api_key.clone())));

    let state = Self {
      notifier: Notifier::new(store.clone(), push.clone()),
      geocoder: Arc::new(Geocoder::new(
        http.clone(),
        &config.geocode_url,
        config.geocode_timeout,
        config.geocode_policy,
      )),
      router: Arc::new(RoutePlanner::new(
        http.clone(),
        config.routing_api_url.clone(),
        config.routing_api_key.clone(),
        config.osrm_url.clone(),
      )),
      moderator: Arc::new(ImageModerator::new(
        http.clone(),
        config.moderation_url.clone(),
        config.moderation_api_key.clone(),
        config.moderation_policy,
      )),
      payments: Arc::new(PaymentGateway::from_config(http, &config)),
      push,
      sms,
      store,
      registry: Arc::new(Registry::<AppError>::new()),
      config: Arc::new(config),
    };

    crate::pipelines::register_all_pipelines(&state.registry);
    state
  }

  fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
      .timeout(OUTBOUND_TIMEOUT)
      .build()
      .map_err(|e| AppError::Config(format!("Cannot build HTTP client: {}", e)))
  }
}
