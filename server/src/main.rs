// homeworks/src/main.rs

use actix_web::{web as actix_data, App, HttpServer};
use homeworks::config::{AppConfig, StoreKind};
use homeworks::errors::AppError;
use homeworks::state::AppState;
use homeworks::store::{MemoryStore, PgStore, Store};
use homeworks::telemetry::init_tracing;
use homeworks::web::{configure_app_routes, cors::cors};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

async fn open_store(config: &AppConfig) -> Result<Arc<dyn Store>, AppError> {
  match config.store {
    StoreKind::Memory => {
      tracing::warn!("Using the in-memory store; data is lost on restart.");
      Ok(Arc::new(MemoryStore::new()))
    }
    StoreKind::Postgres => {
      let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| AppError::Config("DATABASE_URL is required for the postgres store".to_string()))?;
      let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
      tracing::info!("Successfully connected to the database.");
      let store = PgStore::new(pool);
      if config.run_migrations {
        store.migrate().await?;
        tracing::info!("Migrations applied.");
      }
      Ok(Arc::new(store))
    }
  }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  init_tracing();
  tracing::info!("Starting homeworks server...");

  let app_config = match AppConfig::from_env() {
    Ok(cfg) => cfg,
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
    }
  };

  let store = open_store(&app_config).await.map_err(|e| {
    tracing::error!(error = %e, "Failed to open the store.");
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
  })?;

  let server_address = app_config.bind_address();
  let allowed_origins = app_config.allowed_origins.clone();
  let app_state = AppState::new(app_config, store).map_err(|e| {
    tracing::error!(error = %e, "Failed to build application state.");
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
  })?;

  tracing::info!("Attempting to bind server to {}...", server_address);
  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(cors(&allowed_origins))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
