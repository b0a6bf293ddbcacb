// homeworks/src/web/cors.rs

//! CORS for the single-page client, built from the `ALLOWED_ORIGIN` list.

use actix_cors::Cors;
use actix_web::http::{header, Method};

pub const MAX_AGE_SECS: usize = 86400;

pub fn cors(allowed_origins: &[String]) -> Cors {
  let base = Cors::default()
    .allowed_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
    .allowed_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
    .max_age(MAX_AGE_SECS);

  if allowed_origins.iter().any(|o| o == "*") {
    return base.allow_any_origin().send_wildcard();
  }
  allowed_origins
    .iter()
    .fold(base, |cors, origin| cors.allowed_origin(origin))
}

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::{http::StatusCode, test, web, App, HttpResponse};

  async fn ok() -> HttpResponse {
    HttpResponse::Ok().finish()
  }

  fn preflight(origin: &str) -> test::TestRequest {
    test::TestRequest::default()
      .method(Method::OPTIONS)
      .uri("/ping")
      .insert_header((header::ORIGIN, origin))
      .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "POST"))
  }

  #[actix_web::test]
  async fn listed_origin_is_echoed_on_preflight() {
    let origins = vec!["https://app.homeworks.test".to_string()];
    let app = test::init_service(App::new().wrap(cors(&origins)).route("/ping", web::post().to(ok))).await;

    let resp = test::call_service(&app, preflight("https://app.homeworks.test").to_request()).await;
    assert!(resp.status().is_success());
    assert_eq!(
      resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
      "https://app.homeworks.test"
    );
  }

  #[actix_web::test]
  async fn unlisted_origin_is_refused() {
    let origins = vec!["https://app.homeworks.test".to_string()];
    let app = test::init_service(App::new().wrap(cors(&origins)).route("/ping", web::post().to(ok))).await;

    let resp = test::call_service(&app, preflight("https://evil.test").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
  }

  #[actix_web::test]
  async fn wildcard_allows_any_origin() {
    let app = test::init_service(
      App::new()
        .wrap(cors(&["*".to_string()]))
        .route("/ping", web::post().to(ok)),
    )
    .await;

    let resp = test::call_service(&app, preflight("https://anywhere.test").to_request()).await;
    assert!(resp.status().is_success());
    assert_eq!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
  }
}
