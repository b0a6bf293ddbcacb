// homeworks/src/client.rs

//! Typed HTTP client for the homeworks API, as used by the web front end and
//! the operator tooling. It owns the signed-in tokens, the "login as user"
//! swap and the optimistic report-lock view.

use crate::errors::AppError;
use crate::models::session::SessionTokens;
use crate::services::impersonation::ImpersonationSession;
use crate::services::optimistic::ReportLockBook;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Deserialize)]
struct TokenBody {
  access_token: String,
  refresh_token: String,
  expires_at: DateTime<Utc>,
  #[serde(alias = "target_user_id")]
  user_id: Option<Uuid>,
}

#[derive(Deserialize)]
struct VerifyBody {
  user: UserId,
  #[serde(flatten)]
  tokens: TokenBody,
}

#[derive(Deserialize)]
struct UserId {
  id: Uuid,
}

#[derive(Deserialize)]
struct LockItem {
  report_date: NaiveDate,
}

#[derive(Deserialize)]
struct Items<T> {
  items: Vec<T>,
}

impl TokenBody {
  fn into_tokens(self, fallback_user: Uuid) -> SessionTokens {
    SessionTokens {
      access_token: self.access_token,
      refresh_token: self.refresh_token,
      expires_at: self.expires_at,
      user_id: self.user_id.unwrap_or(fallback_user),
    }
  }
}

/// Maps an API error response back onto the error the server raised.
async fn error_from(response: Response) -> AppError {
  let status = response.status();
  let message = response
    .json::<Value>()
    .await
    .ok()
    .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
    .unwrap_or_else(|| format!("HTTP {}", status));
  match status {
    StatusCode::BAD_REQUEST => AppError::Validation(message),
    StatusCode::UNAUTHORIZED => AppError::Auth(message),
    StatusCode::FORBIDDEN => AppError::Forbidden(message),
    StatusCode::NOT_FOUND => AppError::NotFound(message),
    StatusCode::CONFLICT => AppError::Conflict(message),
    StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited(message),
    _ => AppError::Upstream(format!("homeworks API answered {}: {}", status, message)),
  }
}

pub struct HomeworksClient {
  http: Client,
  base_url: String,
  tokens: Option<SessionTokens>,
  impersonation: Option<ImpersonationSession>,
}

impl HomeworksClient {
  pub fn new(http: Client, base_url: &str) -> Self {
    Self {
      http,
      base_url: base_url.trim_end_matches('/').to_string(),
      tokens: None,
      impersonation: None,
    }
  }

  /// Resumes a session signed in elsewhere.
  pub fn with_tokens(mut self, tokens: SessionTokens) -> Self {
    self.tokens = Some(tokens);
    self
  }

  /// Tokens sent with requests: the impersonated user's while impersonating.
  pub fn active_tokens(&self) -> Option<&SessionTokens> {
    match &self.impersonation {
      Some(session) => Some(session.active_tokens()),
      None => self.tokens.as_ref(),
    }
  }

  pub fn is_impersonating(&self) -> bool {
    self.impersonation.is_some()
  }

  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    let builder = self.http.request(method, format!("{}/api/v1{}", self.base_url, path));
    match self.active_tokens() {
      Some(tokens) => builder.bearer_auth(&tokens.access_token),
      None => builder,
    }
  }

  async fn send(builder: RequestBuilder) -> Result<Response, AppError> {
    let response = builder.send().await?;
    if response.status().is_success() {
      Ok(response)
    } else {
      Err(error_from(response).await)
    }
  }

  async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, AppError> {
    let response = Self::send(builder).await?;
    response
      .json()
      .await
      .map_err(|e| AppError::Upstream(format!("Unreadable homeworks API response: {}", e)))
  }

  pub async fn send_login_code(&self, phone: &str) -> Result<(), AppError> {
    Self::send(self.request(Method::POST, "/otp/send").json(&json!({ "phone": phone }))).await?;
    Ok(())
  }

  /// Exchanges a login code for a session and keeps its tokens.
  #[instrument(name = "client::sign_in", skip(self, code))]
  pub async fn sign_in(&mut self, phone: &str, code: &str) -> Result<Uuid, AppError> {
    let body: VerifyBody = Self::send_json(
      self
        .request(Method::POST, "/otp/verify")
        .json(&json!({ "phone": phone, "code": code })),
    )
    .await?;
    let user_id = body.user.id;
    self.tokens = Some(body.tokens.into_tokens(user_id));
    self.impersonation = None;
    info!(%user_id, "Signed in.");
    Ok(user_id)
  }

  pub async fn me(&self) -> Result<Value, AppError> {
    Self::send_json(self.request(Method::GET, "/me")).await
  }

  /// Rotates the active token pair. While impersonating, only the impersonated pair moves.
  #[instrument(name = "client::refresh", skip(self))]
  pub async fn refresh(&mut self) -> Result<(), AppError> {
    let current = self
      .active_tokens()
      .cloned()
      .ok_or_else(|| AppError::Auth("Not signed in.".to_string()))?;
    let body: TokenBody = Self::send_json(
      self
        .http
        .post(format!("{}/api/v1/auth/refresh", self.base_url))
        .json(&json!({ "refresh_token": current.refresh_token })),
    )
    .await?;
    let refreshed = body.into_tokens(current.user_id);
    match &mut self.impersonation {
      Some(session) => session.replace_active(refreshed),
      None => self.tokens = Some(refreshed),
    }
    debug!("Tokens refreshed.");
    Ok(())
  }

  /// Mints a session for `target_user_id` and routes later requests through it.
  #[instrument(name = "client::login_as_user", skip(self))]
  pub async fn login_as_user(&mut self, target_user_id: Uuid) -> Result<(), AppError> {
    if self.impersonation.is_some() {
      return Err(AppError::Forbidden("Already acting as another user.".to_string()));
    }
    let original = self
      .tokens
      .clone()
      .ok_or_else(|| AppError::Auth("Not signed in.".to_string()))?;
    let body: TokenBody = Self::send_json(
      self
        .request(Method::POST, "/auth/login-as-user")
        .json(&json!({ "target_user_id": target_user_id })),
    )
    .await?;
    let impersonated = body.into_tokens(target_user_id);
    self.impersonation = Some(ImpersonationSession::begin(original, impersonated, Utc::now()));
    Ok(())
  }

  /// Revokes the impersonated session on the server, then resumes as the administrator.
  #[instrument(name = "client::return_to_admin", skip(self))]
  pub async fn return_to_admin(&mut self) -> Result<Uuid, AppError> {
    let session = self
      .impersonation
      .take()
      .ok_or_else(|| AppError::Validation("Not acting as another user.".to_string()))?;
    let revoke = self
      .http
      .post(format!("{}/api/v1/auth/logout", self.base_url))
      .bearer_auth(&session.active_tokens().access_token);
    match Self::send(revoke).await {
      // Already gone server-side: nothing left to revoke.
      Ok(_) | Err(AppError::Auth(_)) => {}
      Err(e) => {
        warn!(error = %e, "Could not revoke the impersonated session.");
        self.impersonation = Some(session);
        return Err(e);
      }
    }
    let original = session.end();
    let admin_id = original.user_id;
    self.tokens = Some(original);
    Ok(admin_id)
  }

  pub async fn logout(&mut self) -> Result<(), AppError> {
    if self.impersonation.is_some() {
      self.return_to_admin().await?;
    }
    Self::send(self.request(Method::POST, "/auth/logout")).await?;
    self.tokens = None;
    Ok(())
  }

  pub async fn report_locks(&self, order_id: Uuid) -> Result<ReportLockBook, AppError> {
    let body: Items<LockItem> =
      Self::send_json(self.request(Method::GET, &format!("/orders/{}/reports/locks", order_id))).await?;
    Ok(ReportLockBook::from_dates(body.items.into_iter().map(|l| l.report_date)))
  }

  /// Flips the lock on `date` in `book` right away and commits it. A refused commit
  /// puts the date back the way it was. Returns the new locked state.
  #[instrument(name = "client::toggle_report_lock", skip(self, book))]
  pub async fn toggle_report_lock(
    &self,
    book: &mut ReportLockBook,
    order_id: Uuid,
    date: NaiveDate,
  ) -> Result<bool, AppError> {
    let path = format!("/orders/{}/reports/{}/lock", order_id, date);
    book
      .toggle(date, |lock| {
        let method = if lock { Method::POST } else { Method::DELETE };
        let request = self.request(method, &path);
        async move { Self::send(request).await.map(|_| ()) }
      })
      .await
  }
}
