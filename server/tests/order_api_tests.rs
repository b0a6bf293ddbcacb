// tests/order_api_tests.rs

#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use common::*;
use serde_json::json;
use uuid::Uuid;

#[actix_web::test]
async fn order_advances_once_every_role_has_signed_off() {
  let (state, _) = test_state();
  let app = init_app!(state);
  let (customer, customer_token) = user_with_roles(&state, "09120000001", &["customer"]).await;
  let (_, sales_token) = user_with_roles(&state, "09120000002", &["sales_manager"]).await;
  let (_, ceo_token) = user_with_roles(&state, CEO_PHONE, &["ceo"]).await;

  let (status, created) = send!(
    app,
    TestRequest::post()
      .uri("/api/v1/orders")
      .insert_header(bearer(&customer_token))
      .set_json(json!({ "location": "Tehran, Vanak", "payment_amount": 1_500_000 }))
  );
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(created["order"]["code"], "ORD-1001");
  assert_eq!(created["order"]["status"], "draft");
  let order_id = created["order"]["id"].as_str().unwrap().to_string();

  let (status, submitted) = send!(
    app,
    TestRequest::post()
      .uri(&format!("/api/v1/orders/{}/status", order_id))
      .insert_header(bearer(&customer_token))
      .set_json(json!({ "status": "pending" }))
  );
  assert_eq!(status, StatusCode::OK);
  assert_eq!(submitted["order"]["status"], "pending");
  assert_eq!(submitted["approval_progress"]["total"], 2);

  let (status, first) = send!(
    app,
    TestRequest::post()
      .uri(&format!("/api/v1/orders/{}/approvals/sales_manager", order_id))
      .insert_header(bearer(&sales_token))
  );
  assert_eq!(status, StatusCode::OK);
  assert_eq!(first["outcome"], "recorded");
  assert_eq!(first["progress"]["percent"], 50);
  assert_eq!(first["order_status"], "pending");
  assert_eq!(first["advanced"], false);

  let (_, ledger) = send!(
    app,
    TestRequest::get()
      .uri(&format!("/api/v1/orders/{}/approvals", order_id))
      .insert_header(bearer(&customer_token))
  );
  assert_eq!(ledger["progress"]["ratio"], 0.5);
  assert_eq!(ledger["progress"]["complete"], false);

  let (status, second) = send!(
    app,
    TestRequest::post()
      .uri(&format!("/api/v1/orders/{}/approvals/ceo", order_id))
      .insert_header(bearer(&ceo_token))
  );
  assert_eq!(status, StatusCode::OK);
  assert_eq!(second["progress"]["percent"], 100);
  assert_eq!(second["advanced"], true);
  assert_eq!(second["order_status"], "approved");

  let unread = state.store.unread_count(customer.id).await.unwrap();
  assert!(unread >= 2, "customer should hear about submission and approval, got {}", unread);
}

#[actix_web::test]
async fn approving_without_a_pending_slot_changes_nothing() {
  let (state, _) = test_state();
  let app = init_app!(state);
  let (_, customer_token) = user_with_roles(&state, "09120000001", &["customer"]).await;
  let (_, sales_token) = user_with_roles(&state, "09120000002", &["sales_manager"]).await;

  let (_, created) = send!(
    app,
    TestRequest::post()
      .uri("/api/v1/orders")
      .insert_header(bearer(&customer_token))
      .set_json(json!({}))
  );
  let order_id = created["order"]["id"].as_str().unwrap().to_string();
  send!(
    app,
    TestRequest::post()
      .uri(&format!("/api/v1/orders/{}/status", order_id))
      .insert_header(bearer(&customer_token))
      .set_json(json!({ "status": "pending" }))
  );

  let path = format!("/api/v1/orders/{}/approvals/sales_manager", order_id);
  let (_, first) = send!(app, TestRequest::post().uri(&path).insert_header(bearer(&sales_token)));
  assert_eq!(first["outcome"], "recorded");

  let (status, again) = send!(app, TestRequest::post().uri(&path).insert_header(bearer(&sales_token)));
  assert_eq!(status, StatusCode::OK);
  assert_eq!(again["outcome"], "no_pending_slot");
  assert_eq!(again["progress"]["approved"], 1);

  let ledger = state
    .store
    .list_approvals(Uuid::parse_str(&order_id).unwrap())
    .await
    .unwrap();
  assert_eq!(ledger.len(), 2);
}

#[actix_web::test]
async fn approvers_must_hold_the_role_they_sign_for() {
  let (state, _) = test_state();
  let app = init_app!(state);
  let (_, customer_token) = user_with_roles(&state, "09120000001", &["customer"]).await;

  let (_, created) = send!(
    app,
    TestRequest::post()
      .uri("/api/v1/orders")
      .insert_header(bearer(&customer_token))
      .set_json(json!({}))
  );
  let order_id = created["order"]["id"].as_str().unwrap().to_string();
  send!(
    app,
    TestRequest::post()
      .uri(&format!("/api/v1/orders/{}/status", order_id))
      .insert_header(bearer(&customer_token))
      .set_json(json!({ "status": "pending" }))
  );

  let (status, body) = send!(
    app,
    TestRequest::post()
      .uri(&format!("/api/v1/orders/{}/approvals/ceo", order_id))
      .insert_header(bearer(&customer_token))
  );
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert!(body["error"].is_string());
}

#[actix_web::test]
async fn illegal_transitions_are_conflicts() {
  let (state, _) = test_state();
  let app = init_app!(state);
  let (_, customer_token) = user_with_roles(&state, "09120000001", &["customer"]).await;
  let (_, admin_token) = user_with_roles(&state, "09120000002", &["admin"]).await;

  let (_, created) = send!(
    app,
    TestRequest::post()
      .uri("/api/v1/orders")
      .insert_header(bearer(&customer_token))
      .set_json(json!({}))
  );
  let order_id = created["order"]["id"].as_str().unwrap().to_string();
  let status_uri = format!("/api/v1/orders/{}/status", order_id);

  let (status, _) = send!(
    app,
    TestRequest::post()
      .uri(&status_uri)
      .insert_header(bearer(&admin_token))
      .set_json(json!({ "status": "approved" }))
  );
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, _) = send!(
    app,
    TestRequest::post()
      .uri(&status_uri)
      .insert_header(bearer(&admin_token))
      .set_json(json!({ "status": "completed" }))
  );
  assert_eq!(status, StatusCode::CONFLICT);

  // The customer may submit but not close.
  let (status, _) = send!(
    app,
    TestRequest::post()
      .uri(&status_uri)
      .insert_header(bearer(&customer_token))
      .set_json(json!({ "status": "closed" }))
  );
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (_, order) = send!(
    app,
    TestRequest::get()
      .uri(&format!("/api/v1/orders/{}", order_id))
      .insert_header(bearer(&customer_token))
  );
  assert_eq!(order["order"]["status"], "draft");
}

#[actix_web::test]
async fn ledger_roles_can_reject_a_pending_order() {
  let (state, _) = test_state();
  let app = init_app!(state);
  let (_, customer_token) = user_with_roles(&state, "09120000001", &["customer"]).await;
  let (_, sales_token) = user_with_roles(&state, "09120000002", &["sales_manager"]).await;

  let (_, created) = send!(
    app,
    TestRequest::post()
      .uri("/api/v1/orders")
      .insert_header(bearer(&customer_token))
      .set_json(json!({}))
  );
  let order_id = created["order"]["id"].as_str().unwrap().to_string();
  send!(
    app,
    TestRequest::post()
      .uri(&format!("/api/v1/orders/{}/status", order_id))
      .insert_header(bearer(&customer_token))
      .set_json(json!({ "status": "pending" }))
  );

  let (status, rejected) = send!(
    app,
    TestRequest::post()
      .uri(&format!("/api/v1/orders/{}/reject", order_id))
      .insert_header(bearer(&sales_token))
      .set_json(json!({ "reason": "Site not accessible" }))
  );
  assert_eq!(status, StatusCode::OK);
  assert_eq!(rejected["order"]["status"], "rejected");
  assert_eq!(rejected["previous_status"], "pending");

  // Rejected orders take no further sign-offs.
  let (status, _) = send!(
    app,
    TestRequest::post()
      .uri(&format!("/api/v1/orders/{}/approvals/sales_manager", order_id))
      .insert_header(bearer(&sales_token))
  );
  assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn report_dates_lock_once() {
  let (state, _) = test_state();
  let app = init_app!(state);
  let (_, customer_token) = user_with_roles(&state, "09120000001", &["customer"]).await;
  let (_, manager_token) = user_with_roles(&state, "09120000002", &["general_manager"]).await;

  let (_, created) = send!(
    app,
    TestRequest::post()
      .uri("/api/v1/orders")
      .insert_header(bearer(&customer_token))
      .set_json(json!({}))
  );
  let order_id = created["order"]["id"].as_str().unwrap().to_string();
  let lock_uri = format!("/api/v1/orders/{}/reports/2026-10-19/lock", order_id);

  let (status, lock) = send!(app, TestRequest::post().uri(&lock_uri).insert_header(bearer(&manager_token)));
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(lock["report_date"], "2026-10-19");

  let (status, body) = send!(app, TestRequest::post().uri(&lock_uri).insert_header(bearer(&manager_token)));
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(body["error"].is_string());

  let (status, _) = send!(app, TestRequest::post().uri(&lock_uri).insert_header(bearer(&customer_token)));
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = send!(app, TestRequest::delete().uri(&lock_uri).insert_header(bearer(&manager_token)));
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = send!(app, TestRequest::delete().uri(&lock_uri).insert_header(bearer(&manager_token)));
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn customers_only_see_their_own_orders() {
  let (state, _) = test_state();
  let app = init_app!(state);
  let (_, alice_token) = user_with_roles(&state, "09120000001", &["customer"]).await;
  let (_, bob_token) = user_with_roles(&state, "09120000002", &["customer"]).await;
  let (_, admin_token) = user_with_roles(&state, "09120000003", &["admin"]).await;

  let (_, created) = send!(
    app,
    TestRequest::post()
      .uri("/api/v1/orders")
      .insert_header(bearer(&alice_token))
      .set_json(json!({}))
  );
  let order_uri = format!("/api/v1/orders/{}", created["order"]["id"].as_str().unwrap());

  let (status, _) = send!(app, TestRequest::get().uri(&order_uri).insert_header(bearer(&bob_token)));
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (_, bobs) = send!(app, TestRequest::get().uri("/api/v1/orders").insert_header(bearer(&bob_token)));
  assert_eq!(bobs["count"], 0);
  let (_, all) = send!(app, TestRequest::get().uri("/api/v1/orders").insert_header(bearer(&admin_token)));
  assert_eq!(all["count"], 1);

  let (status, _) = send!(
    app,
    TestRequest::post()
      .uri(&format!("{}/archive", order_uri))
      .insert_header(bearer(&admin_token))
  );
  assert_eq!(status, StatusCode::OK);
  let (_, alices) = send!(app, TestRequest::get().uri("/api/v1/orders").insert_header(bearer(&alice_token)));
  assert_eq!(alices["count"], 0);
}

#[actix_web::test]
async fn requests_without_a_token_are_unauthorized() {
  let (state, _) = test_state();
  let app = init_app!(state);
  let (status, _) = send!(app, TestRequest::get().uri("/api/v1/orders"));
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, body) = send!(app, TestRequest::get().uri("/api/v1/health"));
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "ok");

  let resp = actix_web::test::call_service(
    &app,
    TestRequest::default()
      .method(actix_web::http::Method::OPTIONS)
      .uri("/api/v1/orders")
      .insert_header(("Origin", "https://app.homeworks.test"))
      .insert_header(("Access-Control-Request-Method", "POST"))
      .to_request(),
  )
  .await;
  assert!(resp.status().is_success());
  assert_eq!(resp.headers().get("Access-Control-Allow-Origin").unwrap(), "*");
}

#[actix_web::test]
async fn daily_reports_keep_versions_until_the_day_is_locked() {
  let (state, _) = test_state();
  let app = init_app!(state);
  let (_, customer_token) = user_with_roles(&state, "09120000001", &["customer"]).await;
  let (_, manager_token) = user_with_roles(&state, "09120000002", &["general_manager"]).await;
  let (_, stranger_token) = user_with_roles(&state, "09120000003", &["customer"]).await;

  let (_, created) = send!(
    app,
    TestRequest::post()
      .uri("/api/v1/orders")
      .insert_header(bearer(&customer_token))
      .set_json(json!({}))
  );
  let order_id = created["order"]["id"].as_str().unwrap().to_string();
  let versions_uri = format!("/api/v1/orders/{}/reports/2026-10-19/versions", order_id);

  for crew in [3, 4] {
    let (status, saved) = send!(
      app,
      TestRequest::post()
        .uri(&versions_uri)
        .insert_header(bearer(&manager_token))
        .set_json(json!({ "content": { "crew": crew, "notes": "scaffold up" } }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(saved["content"]["crew"], crew);
  }

  let (status, _) = send!(
    app,
    TestRequest::post()
      .uri(&versions_uri)
      .insert_header(bearer(&customer_token))
      .set_json(json!({ "content": { "crew": 9 } }))
  );
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, history) = send!(app, TestRequest::get().uri(&versions_uri).insert_header(bearer(&customer_token)));
  assert_eq!(status, StatusCode::OK);
  assert_eq!(history["items"][0]["version"], 2);
  assert_eq!(history["items"][1]["version"], 1);
  let (status, _) = send!(app, TestRequest::get().uri(&versions_uri).insert_header(bearer(&stranger_token)));
  assert_eq!(status, StatusCode::NOT_FOUND);

  let lock_uri = format!("/api/v1/orders/{}/reports/2026-10-19/lock", order_id);
  send!(app, TestRequest::post().uri(&lock_uri).insert_header(bearer(&manager_token)));
  let (status, _) = send!(
    app,
    TestRequest::post()
      .uri(&versions_uri)
      .insert_header(bearer(&manager_token))
      .set_json(json!({ "content": { "crew": 5 } }))
  );
  assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn public_contractor_list_needs_no_sign_in_and_hides_phones() {
  let (state, _) = test_state();
  let app = init_app!(state);
  let (contractor, _) = user_with_roles(&state, "09120000004", &["contractor"]).await;
  user_with_roles(&state, "09120000005", &["customer"]).await;

  let (status, body) = send!(app, TestRequest::get().uri("/api/v1/contractors/public"));
  assert_eq!(status, StatusCode::OK);
  let items = body["items"].as_array().unwrap();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0]["id"], contractor.id.to_string());
  assert_eq!(items[0]["display_name"], "Contractor");
  assert!(!body.to_string().contains("09120000004"));
}
