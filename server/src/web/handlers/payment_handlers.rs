// homeworks/src/web/handlers/payment_handlers.rs

//! The gateway sends the browser back here after a payment attempt. The answer
//! is always an HTML page that moves the browser into the app.

use actix_web::{http::header::ContentType, web, HttpResponse};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use super::run_pipeline;
use crate::errors::AppError;
use crate::models::order::OrderStatus;
use crate::models::payment::{Payment, PaymentStatus};
use crate::pipelines::contexts::{Actor, StatusChangeCtxData};
use crate::services::payment_gateway::redirect_page;
use crate::state::AppState;
use stagehand::ContextData;

#[derive(Deserialize, Debug)]
pub struct PaymentCallbackQuery {
  #[serde(rename = "Authority", alias = "authority")]
  pub authority: String,
  #[serde(rename = "Status", alias = "status", default)]
  pub status: Option<String>,
}

fn redirect(app_state: &AppState, path: &str) -> HttpResponse {
  let target = format!("{}{}", app_state.config.app_base_url.trim_end_matches('/'), path);
  HttpResponse::Ok()
    .content_type(ContentType::html())
    .body(redirect_page(&target))
}

async fn mark(app_state: &AppState, payment: &Payment, status: PaymentStatus, ref_id: Option<String>) {
  if let Err(e) = app_state.store.update_payment(payment.id, status, ref_id).await {
    error!(payment_id = %payment.id, error = %e, "Could not record payment outcome.");
  }
}

#[instrument(name = "handler::verify_payment", skip_all, fields(authority = %query.authority))]
pub async fn verify_payment_handler(
  app_state: web::Data<AppState>,
  query: web::Query<PaymentCallbackQuery>,
) -> Result<HttpResponse, AppError> {
  let Some(payment) = app_state.store.find_payment_by_authority(&query.authority).await? else {
    warn!("Callback for an unknown payment authority.");
    return Ok(redirect(&app_state, "/orders?payment=unknown"));
  };
  let order_path = format!("/orders/{}", payment.order_id);

  if payment.status == PaymentStatus::Verified {
    return Ok(redirect(&app_state, &format!("{}?payment=success", order_path)));
  }
  if !query.status.as_deref().map_or(false, |s| s.eq_ignore_ascii_case("ok")) {
    info!(payment_id = %payment.id, "Payment cancelled at the gateway.");
    mark(&app_state, &payment, PaymentStatus::Failed, None).await;
    return Ok(redirect(&app_state, &format!("{}?payment=failed", order_path)));
  }

  match app_state.payments.verify(&payment.authority, payment.amount).await {
    Ok(verified) => {
      mark(&app_state, &payment, PaymentStatus::Verified, verified.ref_id).await;
      let ctx_data = ContextData::new(StatusChangeCtxData::new(
        app_state.get_ref().clone(),
        payment.order_id,
        OrderStatus::Paid,
        Actor::System,
        Some("Payment verified".to_string()),
      ));
      // The money is taken either way; a refused transition is for staff to sort out.
      if let Err(e) = run_pipeline(&app_state, ctx_data, "change_status").await {
        warn!(order_id = %payment.order_id, error = %e, "Payment verified but order could not be marked paid.");
      }
      Ok(redirect(&app_state, &format!("{}?payment=success", order_path)))
    }
    Err(e) => {
      warn!(payment_id = %payment.id, error = %e, "Payment verification failed.");
      mark(&app_state, &payment, PaymentStatus::Failed, None).await;
      Ok(redirect(&app_state, &format!("{}?payment=failed", order_path)))
    }
  }
}
