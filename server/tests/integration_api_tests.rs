// tests/integration_api_tests.rs

//! Outbound integrations end to end, against local stand-ins for the
//! payment gateway, push provider, geocoder, router and image classifier.

#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use actix_web::{web, HttpResponse};
use common::*;
use homeworks::config::AppConfig;
use homeworks::models::order::OrderStatus;
use homeworks::models::payment::PaymentStatus;
use homeworks::state::AppState;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

const AUTHORITY: &str = "A00000000000000000000000000000012345";

/// Gateway that opens every payment under `AUTHORITY` and answers verification with `verify_code`.
fn spawn_gateway(verify_code: i64, verify_calls: Arc<Mutex<Vec<Value>>>) -> String {
  spawn_http(move |cfg| {
    let verify_calls = verify_calls.clone();
    cfg
      .route(
        "/request",
        web::post().to(|| async { HttpResponse::Ok().json(json!({ "data": { "code": 100, "authority": AUTHORITY } })) }),
      )
      .route(
        "/verify",
        web::post().to(move |body: web::Json<Value>| {
          let verify_calls = verify_calls.clone();
          async move {
            verify_calls.lock().push(body.into_inner());
            HttpResponse::Ok().json(json!({ "data": { "code": verify_code, "ref_id": 987654 } }))
          }
        }),
      );
  })
}

fn gateway_config(base: &str) -> AppConfig {
  AppConfig {
    app_base_url: "https://app.homeworks.test".to_string(),
    payment_request_url: Some(format!("{}/request", base)),
    payment_verify_url: Some(format!("{}/verify", base)),
    payment_start_url: Some(format!("{}/start", base)),
    payment_merchant_id: Some("merchant-1".to_string()),
    ..test_config()
  }
}

/// A completed order with an amount due, owned by a fresh customer.
async fn completed_order(state: &AppState) -> (Uuid, String) {
  let (customer, token) = user_with_roles(state, "09120000001", &["customer"]).await;
  let seq = state.store.next_order_sequence().await.unwrap();
  let order = state
    .store
    .insert_order(
      homeworks::models::order::NewOrder {
        customer_id: customer.id,
        service_id: None,
        location: Some("Tehran, Vanak".to_string()),
        payment_amount: 2_500_000,
      },
      homeworks::models::order::service_code(seq),
    )
    .await
    .unwrap();
  state
    .store
    .update_order_status(order.id, OrderStatus::Draft, OrderStatus::Completed)
    .await
    .unwrap()
    .unwrap();
  (order.id, token)
}

/// Calls the payment callback and returns the redirect page.
macro_rules! callback {
  ($app:expr, $query:expr) => {{
    let resp = actix_web::test::call_service(
      &$app,
      TestRequest::get()
        .uri(&format!("/api/v1/payments/verify?{}", $query))
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    String::from_utf8(actix_web::test::read_body(resp).await.to_vec()).unwrap()
  }};
}

#[actix_web::test]
async fn verified_payment_marks_the_order_paid() {
  let verify_calls = Arc::new(Mutex::new(Vec::new()));
  let gateway = spawn_gateway(100, verify_calls.clone());
  let (state, _) = state_with_config(gateway_config(&gateway));
  let app = init_app!(state);
  let (order_id, token) = completed_order(&state).await;

  let (status, started) = send!(
    app,
    TestRequest::post()
      .uri(&format!("/api/v1/orders/{}/payments", order_id))
      .insert_header(bearer(&token))
  );
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(started["payment_url"], format!("{}/start/{}", gateway, AUTHORITY));
  assert_eq!(started["payment"]["status"], "initiated");

  let page = callback!(app, format!("Authority={}&Status=OK", AUTHORITY));
  assert!(page.contains(&format!("https://app.homeworks.test/orders/{}?payment=success", order_id)));

  let payment = state.store.find_payment_by_authority(AUTHORITY).await.unwrap().unwrap();
  assert_eq!(payment.status, PaymentStatus::Verified);
  assert_eq!(payment.ref_id.as_deref(), Some("987654"));
  let order = state.store.find_order(order_id).await.unwrap().unwrap();
  assert_eq!(order.status, OrderStatus::Paid);

  let calls = verify_calls.lock();
  assert_eq!(calls.len(), 1);
  assert_eq!(calls[0]["merchant_id"], "merchant-1");
  assert_eq!(calls[0]["amount"], 2_500_000);
  assert_eq!(calls[0]["authority"], AUTHORITY);
}

#[actix_web::test]
async fn cancelled_payment_is_failed_without_asking_the_gateway() {
  let verify_calls = Arc::new(Mutex::new(Vec::new()));
  let gateway = spawn_gateway(100, verify_calls.clone());
  let (state, _) = state_with_config(gateway_config(&gateway));
  let app = init_app!(state);
  let (order_id, token) = completed_order(&state).await;
  send!(
    app,
    TestRequest::post()
      .uri(&format!("/api/v1/orders/{}/payments", order_id))
      .insert_header(bearer(&token))
  );

  let page = callback!(app, format!("Authority={}&Status=NOK", AUTHORITY));
  assert!(page.contains("payment=failed"));
  assert!(verify_calls.lock().is_empty());
  let payment = state.store.find_payment_by_authority(AUTHORITY).await.unwrap().unwrap();
  assert_eq!(payment.status, PaymentStatus::Failed);
  assert_eq!(
    state.store.find_order(order_id).await.unwrap().unwrap().status,
    OrderStatus::Completed
  );
}

#[actix_web::test]
async fn declined_verification_leaves_the_order_unpaid() {
  let gateway = spawn_gateway(-51, Arc::new(Mutex::new(Vec::new())));
  let (state, _) = state_with_config(gateway_config(&gateway));
  let app = init_app!(state);
  let (order_id, token) = completed_order(&state).await;
  send!(
    app,
    TestRequest::post()
      .uri(&format!("/api/v1/orders/{}/payments", order_id))
      .insert_header(bearer(&token))
  );

  let page = callback!(app, format!("Authority={}&Status=OK", AUTHORITY));
  assert!(page.contains("payment=failed"));
  let payment = state.store.find_payment_by_authority(AUTHORITY).await.unwrap().unwrap();
  assert_eq!(payment.status, PaymentStatus::Failed);
  assert_eq!(
    state.store.find_order(order_id).await.unwrap().unwrap().status,
    OrderStatus::Completed
  );
}

#[actix_web::test]
async fn unknown_authority_redirects_to_the_order_list() {
  let gateway = spawn_gateway(100, Arc::new(Mutex::new(Vec::new())));
  let (state, _) = state_with_config(gateway_config(&gateway));
  let app = init_app!(state);

  let page = callback!(app, "Authority=A-NOT-OURS&Status=OK");
  assert!(page.contains("https://app.homeworks.test/orders?payment=unknown"));
}

#[actix_web::test]
async fn push_relay_forwards_to_the_provider_for_staff_only() {
  let seen = Arc::new(Mutex::new(Vec::<(Option<String>, Value)>::new()));
  let provider = {
    let seen = seen.clone();
    spawn_http(move |cfg| {
      let seen = seen.clone();
      cfg.route(
        "/notifications",
        web::post().to(move |req: actix_web::HttpRequest, body: web::Json<Value>| {
          let seen = seen.clone();
          async move {
            let auth = req
              .headers()
              .get("Authorization")
              .and_then(|v| v.to_str().ok())
              .map(str::to_string);
            seen.lock().push((auth, body.into_inner()));
            HttpResponse::Ok().json(json!({ "id": "n-1", "recipients": 1 }))
          }
        }),
      );
    })
  };
  let (state, _) = state_with_config(AppConfig {
    push_relay_url: Some(format!("{}/notifications", provider)),
    push_api_key: Some("push-key".to_string()),
    ..test_config()
  });
  let app = init_app!(state);
  let (_, manager_token) = user_with_roles(&state, "09120000002", &["general_manager"]).await;
  let (customer, customer_token) = user_with_roles(&state, "09120000003", &["customer"]).await;
  let message = json!({
    "recipients": [customer.id],
    "title": "Crew on the way",
    "body": "Your scaffold crew arrives at 9.",
    "link": "https://app.homeworks.test/orders",
  });

  let (status, _) = send!(
    app,
    TestRequest::post()
      .uri("/api/v1/push/relay")
      .insert_header(bearer(&customer_token))
      .set_json(message.clone())
  );
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert!(seen.lock().is_empty());

  let (status, body) = send!(
    app,
    TestRequest::post()
      .uri("/api/v1/push/relay")
      .insert_header(bearer(&manager_token))
      .set_json(message)
  );
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["sent"], true);

  let seen = seen.lock();
  assert_eq!(seen.len(), 1);
  assert_eq!(seen[0].0.as_deref(), Some("Basic push-key"));
  assert_eq!(seen[0].1["include_external_user_ids"][0], customer.id.to_string());
  assert_eq!(seen[0].1["headings"]["en"], "Crew on the way");
  assert_eq!(seen[0].1["url"], "https://app.homeworks.test/orders");
}

#[actix_web::test]
async fn geocode_and_route_use_the_configured_services() {
  let upstream = spawn_http(|cfg| {
    cfg
      .route(
        "/search",
        web::get().to(|| async {
          HttpResponse::Ok().json(json!([
            { "display_name": "Vanak Square, Tehran", "lat": "35.7575", "lon": "51.4100" },
            { "display_name": "Unparseable", "lat": "north", "lon": "51.4" },
          ]))
        }),
      )
      .route(
        "/route/v1/driving/{coords}",
        web::get().to(|| async {
          HttpResponse::Ok().json(json!({ "code": "Ok", "routes": [{ "distance": 12500.5, "duration": 960.0 }] }))
        }),
      );
  });
  let (state, _) = state_with_config(AppConfig {
    geocode_url: upstream.clone(),
    osrm_url: Some(upstream.clone()),
    ..test_config()
  });
  let app = init_app!(state);
  let (_, token) = user_with_roles(&state, "09120000001", &["customer"]).await;

  let (status, found) = send!(
    app,
    TestRequest::get()
      .uri("/api/v1/geocode?q=Vanak")
      .insert_header(bearer(&token))
  );
  assert_eq!(status, StatusCode::OK);
  assert_eq!(found["degraded"], false);
  assert_eq!(found["places"].as_array().unwrap().len(), 1);
  assert_eq!(found["places"][0]["display_name"], "Vanak Square, Tehran");
  assert_eq!(found["places"][0]["lat"], 35.7575);

  let (status, route) = send!(
    app,
    TestRequest::get()
      .uri("/api/v1/route?from=35.6892,51.3890&to=35.7575,51.4100")
      .insert_header(bearer(&token))
  );
  assert_eq!(status, StatusCode::OK);
  assert_eq!(route["source"], "osrm");
  assert_eq!(route["distance_meters"], 12500.5);
  assert_eq!(route["duration_seconds"], 960.0);

  let (status, _) = send!(
    app,
    TestRequest::get()
      .uri("/api/v1/route?from=north&to=35.7575,51.4100")
      .insert_header(bearer(&token))
  );
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn flagged_images_are_not_allowed() {
  let classifier = spawn_http(|cfg| {
    cfg.route(
      "/classify",
      web::post().to(|body: web::Json<Value>| async move {
        let flagged = body["image_url"].as_str().map_or(false, |u| u.contains("unsafe"));
        let categories = if flagged { json!(["violence"]) } else { json!([]) };
        HttpResponse::Ok().json(json!({ "flagged": flagged, "categories": categories }))
      }),
    );
  });
  let (state, _) = state_with_config(AppConfig {
    moderation_url: Some(format!("{}/classify", classifier)),
    ..test_config()
  });
  let app = init_app!(state);
  let (_, token) = user_with_roles(&state, "09120000001", &["contractor"]).await;

  let (status, verdict) = send!(
    app,
    TestRequest::post()
      .uri("/api/v1/moderation/image")
      .insert_header(bearer(&token))
      .set_json(json!({ "image_url": "https://cdn.homeworks.test/unsafe.jpg" }))
  );
  assert_eq!(status, StatusCode::OK);
  assert_eq!(verdict["allowed"], false);
  assert_eq!(verdict["checked"], true);
  assert_eq!(verdict["categories"][0], "violence");

  let (_, verdict) = send!(
    app,
    TestRequest::post()
      .uri("/api/v1/moderation/image")
      .insert_header(bearer(&token))
      .set_json(json!({ "image_url": "https://cdn.homeworks.test/site.jpg" }))
  );
  assert_eq!(verdict["allowed"], true);
}
