// homeworks/src/web/routes.rs

use crate::web::handlers::{
  auth_handlers, integration_handlers, module_handlers, notification_handlers, order_handlers, payment_handlers,
  user_handlers, whitelist_handlers,
};
use actix_web::web;

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/otp")
          .route("/send", web::post().to(auth_handlers::send_otp_handler))
          .route("/verify", web::post().to(auth_handlers::verify_otp_handler)),
      )
      .service(
        web::scope("/auth")
          .route("/refresh", web::post().to(auth_handlers::refresh_handler))
          .route("/logout", web::post().to(auth_handlers::logout_handler))
          .route("/login-as-user", web::post().to(auth_handlers::login_as_user_handler)),
      )
      .route("/contractors/public", web::get().to(user_handlers::public_contractors_handler))
      .route("/me", web::get().to(auth_handlers::me_handler))
      .service(
        web::scope("/orders")
          .route("", web::get().to(order_handlers::list_orders_handler))
          .route("", web::post().to(order_handlers::create_order_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route("/{order_id}/status", web::post().to(order_handlers::change_status_handler))
          .route("/{order_id}/reject", web::post().to(order_handlers::reject_order_handler))
          .route("/{order_id}/archive", web::post().to(order_handlers::archive_order_handler))
          .route(
            "/{order_id}/contractor",
            web::post().to(order_handlers::assign_contractor_handler),
          )
          .route("/{order_id}/approvals", web::get().to(order_handlers::list_approvals_handler))
          .route(
            "/{order_id}/approvals/{role}",
            web::post().to(order_handlers::approve_order_handler),
          )
          .route(
            "/{order_id}/reports/locks",
            web::get().to(order_handlers::list_report_locks_handler),
          )
          .route(
            "/{order_id}/reports/{date}/lock",
            web::post().to(order_handlers::lock_report_date_handler),
          )
          .route(
            "/{order_id}/reports/{date}/lock",
            web::delete().to(order_handlers::unlock_report_date_handler),
          )
          .route(
            "/{order_id}/reports/{date}/versions",
            web::get().to(order_handlers::list_report_versions_handler),
          )
          .route(
            "/{order_id}/reports/{date}/versions",
            web::post().to(order_handlers::save_report_version_handler),
          )
          .route("/{order_id}/payments", web::post().to(order_handlers::start_payment_handler)),
      )
      .service(
        web::scope("/notifications")
          .route("", web::get().to(notification_handlers::list_notifications_handler))
          .route("/{notification_id}/read", web::post().to(notification_handlers::mark_read_handler)),
      )
      .service(
        web::scope("/whitelist")
          .route("", web::get().to(whitelist_handlers::list_whitelist_handler))
          .route("", web::post().to(whitelist_handlers::add_whitelist_handler))
          .route("/check/{phone}", web::get().to(whitelist_handlers::check_whitelist_handler))
          .route("/{phone}", web::delete().to(whitelist_handlers::remove_whitelist_handler)),
      )
      .service(
        web::scope("/modules")
          .route("", web::post().to(module_handlers::create_module_handler))
          .route("/{module_id}/delete", web::post().to(module_handlers::delete_module_handler))
          .route("/{module_id}/versions", web::get().to(module_handlers::list_module_versions_handler))
          .route("/{module_id}/versions", web::post().to(module_handlers::save_module_version_handler)),
      )
      .route("/push/relay", web::post().to(integration_handlers::push_relay_handler))
      .route("/geocode", web::get().to(integration_handlers::geocode_handler))
      .route("/route", web::get().to(integration_handlers::route_handler))
      .route("/moderation/image", web::post().to(integration_handlers::moderation_handler))
      .route("/payments/verify", web::get().to(payment_handlers::verify_payment_handler)),
  );
}
