// tests/common/mod.rs
#![allow(dead_code)]

use chrono::Utc;
use homeworks::config::AppConfig;
use homeworks::models::role::Role;
use homeworks::models::user::User;
use homeworks::services::auth_service::issue_session;
use homeworks::services::sms::OutboxSmsSender;
use homeworks::state::AppState;
use homeworks::store::{MemoryStore, Store};
use std::net::TcpListener;
use std::sync::Arc;

pub const CEO_PHONE: &str = "09120000009";

/// Sends a request through the app; yields `(status, json body)` with `Null` for empty bodies.
macro_rules! send {
  ($app:expr, $req:expr) => {{
    let resp = actix_web::test::call_service(&$app, $req.to_request()).await;
    let status = resp.status();
    let bytes = actix_web::test::read_body(resp).await;
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
  }};
}

/// Builds the service the way `main` does, minus the logger.
macro_rules! init_app {
  ($state:expr) => {
    actix_web::test::init_service(
      actix_web::App::new()
        .app_data(actix_web::web::Data::new($state.clone()))
        .wrap(homeworks::web::cors::cors(&["*".to_string()]))
        .configure(homeworks::web::configure_app_routes),
    )
    .await
  };
}

pub fn test_config() -> AppConfig {
  AppConfig {
    ceo_phone: Some(CEO_PHONE.to_string()),
    osrm_url: None,
    ..AppConfig::default()
  }
}

pub fn test_state() -> (AppState, Arc<OutboxSmsSender>) {
  state_with_config(test_config())
}

pub fn state_with_config(config: AppConfig) -> (AppState, Arc<OutboxSmsSender>) {
  homeworks::telemetry::init_tracing();
  let outbox = Arc::new(OutboxSmsSender::new());
  let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
  let state = AppState::with_sms(config, store, outbox.clone()).expect("state builds");
  (state, outbox)
}

/// Serves `configure` on an ephemeral local port and returns its base URL.
/// Stands in for third-party HTTP services in tests.
pub fn spawn_http<F>(configure: F) -> String
where
  F: Fn(&mut actix_web::web::ServiceConfig) + Clone + Send + 'static,
{
  let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
  let addr = listener.local_addr().expect("local addr");
  let server = actix_web::HttpServer::new(move || actix_web::App::new().configure(configure.clone()))
    .workers(1)
    .disable_signals()
    .listen(listener)
    .expect("listen")
    .run();
  actix_web::rt::spawn(server);
  format!("http://{}", addr)
}

/// Serves the whole homeworks app for `state` on an ephemeral port.
pub fn spawn_app(state: AppState) -> String {
  spawn_http(move |cfg| {
    cfg
      .app_data(actix_web::web::Data::new(state.clone()))
      .configure(homeworks::web::configure_app_routes);
  })
}

/// Creates a user holding `roles` and returns it with a fresh access token.
pub async fn user_with_roles(state: &AppState, phone: &str, roles: &[&str]) -> (User, String) {
  let user = state.store.create_user(phone, None).await.expect("user created");
  for tag in roles {
    state.store.grant_role(user.id, &Role::from(*tag)).await.expect("role granted");
  }
  let (_, tokens) = issue_session(state.store.as_ref(), &state.config, user.id, None, Utc::now())
    .await
    .expect("session issued");
  (user, tokens.access_token)
}

pub fn bearer(token: &str) -> (actix_web::http::header::HeaderName, String) {
  (actix_web::http::header::AUTHORIZATION, format!("Bearer {}", token))
}
