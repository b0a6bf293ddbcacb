// homeworks/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use stagehand::FlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Too Many Requests: {0}")]
  RateLimited(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Upstream Service Error: {0}")]
  Upstream(String),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<reqwest::Error> for AppError {
  fn from(err: reqwest::Error) -> Self {
    AppError::Upstream(err.to_string())
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) => StatusCode::FORBIDDEN,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Conflict(_) => StatusCode::CONFLICT,
      AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
      AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
      AppError::Workflow { source: FlowError::StepTimeout { .. } } => StatusCode::GATEWAY_TIMEOUT,
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Responding with error");
    }
    let body = match self {
      AppError::Validation(m)
      | AppError::Auth(m)
      | AppError::Forbidden(m)
      | AppError::NotFound(m)
      | AppError::Conflict(m)
      | AppError::RateLimited(m) => json!({"error": m}),
      AppError::Config(m) => json!({"error": "Configuration issue", "detail": m}),
      AppError::Sqlx(_) => json!({"error": "Database operation failed"}),
      AppError::Upstream(m) => json!({"error": "Upstream service unavailable", "detail": m}),
      AppError::Workflow { source } => {
        tracing::error!(workflow_error_source = ?source, "Workflow error details");
        json!({"error": "Workflow processing error", "detail": source.to_string()})
      }
      AppError::Internal(m) => json!({"error": "An internal error occurred", "detail": m}),
    };
    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
