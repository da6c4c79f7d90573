// tests/http_api_tests.rs
mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use agri_market::config::{AppConfig, MAX_TOKEN_TTL_HOURS};
use agri_market::web::configure_app_routes;
use common::*;
use serde_json::{json, Value};

macro_rules! init_app {
  ($state:expr) => {
    test::init_service(App::new().app_data(web::Data::new($state)).configure(configure_app_routes)).await
  };
}

/// Registers an account over HTTP and evaluates to its bearer token.
macro_rules! register {
  ($app:expr, $email:expr, $role:expr) => {{
    let req = test::TestRequest::post()
      .uri("/api/auth/register")
      .set_json(json!({ "name": "Test Grower", "email": $email, "password": "s3cret-pass", "role": $role }))
      .to_request();
    let resp = test::call_service(&$app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    body["token"].as_str().unwrap().to_string()
  }};
}

fn bearer(token: &str) -> (&'static str, String) {
  ("Authorization", format!("Bearer {}", token))
}

#[actix_web::test]
async fn test_health_endpoint() {
  setup_tracing();
  let (_store, state) = memory_state();
  let app = init_app!(state);

  let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request()).await;

  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body, json!({ "status": "ok" }));
}

#[actix_web::test]
async fn test_register_login_and_me() {
  setup_tracing();
  let (_store, state) = memory_state();
  let app = init_app!(state);

  let token = register!(app, "Grower@Farm.test", "seller");

  let login = test::TestRequest::post()
    .uri("/api/auth/login")
    .set_json(json!({ "email": "grower@farm.test", "password": "s3cret-pass" }))
    .to_request();
  let resp = test::call_service(&app, login).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert!(body["token"].as_str().is_some());
  assert_eq!(body["user"]["role"], "seller");
  assert!(body["user"].get("password_hash").is_none());

  let me = test::TestRequest::get().uri("/api/auth/me").insert_header(bearer(&token)).to_request();
  let resp = test::call_service(&app, me).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["user"]["email"], "grower@farm.test");
}

#[actix_web::test]
async fn test_duplicate_registration_and_bad_login() {
  setup_tracing();
  let (_store, state) = memory_state();
  let app = init_app!(state);
  register!(app, "dup@farm.test", "buyer");

  let again = test::TestRequest::post()
    .uri("/api/auth/register")
    .set_json(json!({ "name": "Twin", "email": "dup@farm.test", "password": "another-pass", "role": "buyer" }))
    .to_request();
  assert_eq!(test::call_service(&app, again).await.status(), StatusCode::CONFLICT);

  let bad_role = test::TestRequest::post()
    .uri("/api/auth/register")
    .set_json(json!({ "name": "Odd", "email": "odd@farm.test", "password": "pass-word", "role": "overlord" }))
    .to_request();
  assert_eq!(test::call_service(&app, bad_role).await.status(), StatusCode::BAD_REQUEST);

  let wrong_password = test::TestRequest::post()
    .uri("/api/auth/login")
    .set_json(json!({ "email": "dup@farm.test", "password": "nope" }))
    .to_request();
  assert_eq!(test::call_service(&app, wrong_password).await.status(), StatusCode::UNAUTHORIZED);

  let unknown = test::TestRequest::post()
    .uri("/api/auth/login")
    .set_json(json!({ "email": "ghost@farm.test", "password": "nope" }))
    .to_request();
  assert_eq!(test::call_service(&app, unknown).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_missing_token_is_401_and_invalid_token_is_403() {
  setup_tracing();
  let (_store, state) = memory_state();
  let app = init_app!(state);

  let resp = test::call_service(&app, test::TestRequest::get().uri("/api/cart").to_request()).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body, json!({ "error": "Token is missing" }));

  let basic = test::TestRequest::get()
    .uri("/api/cart")
    .insert_header(("Authorization", "Basic dXNlcjpwYXNz"))
    .to_request();
  assert_eq!(test::call_service(&app, basic).await.status(), StatusCode::UNAUTHORIZED);

  let forged = test::TestRequest::get()
    .uri("/api/orders")
    .insert_header(bearer("not.a.token"))
    .to_request();
  let resp = test::call_service(&app, forged).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body, json!({ "error": "Token is invalid" }));
}

#[actix_web::test]
async fn test_cart_to_order_flow_over_http() {
  setup_tracing();
  let (_store, state) = memory_state();
  let app = init_app!(state);
  let seller = register!(app, "seller@farm.test", "seller");
  let buyer = register!(app, "buyer@farm.test", "buyer");
  let stranger = register!(app, "stranger@farm.test", "buyer");

  let create = test::TestRequest::post()
    .uri("/api/products")
    .insert_header(bearer(&seller))
    .set_json(json!({ "name": "Heirloom Tomatoes", "price": "3.75", "unit": "kg", "organic": true }))
    .to_request();
  let resp = test::call_service(&app, create).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let body: Value = test::read_body_json(resp).await;
  let product_id = body["product"]["id"].as_str().unwrap().to_string();

  for qty in [2, 2] {
    let add = test::TestRequest::post()
      .uri("/api/cart")
      .insert_header(bearer(&buyer))
      .set_json(json!({ "productId": product_id, "quantity": qty }))
      .to_request();
    assert_eq!(test::call_service(&app, add).await.status(), StatusCode::CREATED);
  }

  let view = test::TestRequest::get().uri("/api/cart").insert_header(bearer(&buyer)).to_request();
  let cart: Value = test::call_and_read_body_json(&app, view).await;
  assert_eq!(cart["items"][0]["quantity"], 4);
  assert_eq!(cart["subtotal"], "15.00");

  let checkout = || {
    test::TestRequest::post()
      .uri("/api/orders")
      .insert_header(bearer(&buyer))
      .insert_header(("Idempotency-Key", "checkout-001"))
      .set_json(json!({ "shippingAddress": "1 Market St", "paymentMethod": "card" }))
      .to_request()
  };
  let resp = test::call_service(&app, checkout()).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let placed: Value = test::read_body_json(resp).await;
  assert_eq!(placed["message"], "Order placed");
  assert_eq!(placed["replayed"], false);
  let order_id = placed["order_id"].as_str().unwrap().to_string();

  let resp = test::call_service(&app, checkout()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let replayed: Value = test::read_body_json(resp).await;
  assert_eq!(replayed["order_id"], order_id.as_str());
  assert_eq!(replayed["replayed"], true);

  let detail = test::TestRequest::get()
    .uri(&format!("/api/orders/{}", order_id))
    .insert_header(bearer(&buyer))
    .to_request();
  let resp = test::call_service(&app, detail).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["order"]["items"][0]["name"], "Heirloom Tomatoes");
  assert_eq!(body["order"]["items"][0]["price"], "3.75");
  assert_eq!(body["order"]["total"], "15.00");

  let peek = test::TestRequest::get()
    .uri(&format!("/api/orders/{}", order_id))
    .insert_header(bearer(&stranger))
    .to_request();
  assert_eq!(test::call_service(&app, peek).await.status(), StatusCode::NOT_FOUND);

  let list = test::TestRequest::get().uri("/api/orders").insert_header(bearer(&buyer)).to_request();
  let body: Value = test::call_and_read_body_json(&app, list).await;
  assert_eq!(body["orders"].as_array().unwrap().len(), 1);
  assert_eq!(body["orders"][0]["status"], "pending");
}

#[actix_web::test]
async fn test_checkout_errors_map_to_client_statuses() {
  setup_tracing();
  let (_store, state) = memory_state();
  let app = init_app!(state);
  let buyer = register!(app, "empty@farm.test", "buyer");

  let empty = test::TestRequest::post()
    .uri("/api/orders")
    .insert_header(bearer(&buyer))
    .set_json(json!({ "shippingAddress": "1 Market St", "paymentMethod": "card" }))
    .to_request();
  let resp = test::call_service(&app, empty).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body, json!({ "error": "Cart is empty" }));

  let malformed = test::TestRequest::post()
    .uri("/api/orders")
    .insert_header(bearer(&buyer))
    .insert_header(("Content-Type", "application/json"))
    .set_payload("{ not json")
    .to_request();
  assert_eq!(test::call_service(&app, malformed).await.status(), StatusCode::BAD_REQUEST);

  let bad_quantity = test::TestRequest::post()
    .uri("/api/cart")
    .insert_header(bearer(&buyer))
    .set_json(json!({ "productId": uuid::Uuid::new_v4(), "quantity": 0 }))
    .to_request();
  assert_eq!(test::call_service(&app, bad_quantity).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_role_restricted_endpoints() {
  setup_tracing();
  let (_store, state) = memory_state();
  let app = init_app!(state);
  let buyer = register!(app, "plain@farm.test", "buyer");
  let admin = register!(app, "root@farm.test", "admin");

  let create = test::TestRequest::post()
    .uri("/api/products")
    .insert_header(bearer(&buyer))
    .set_json(json!({ "name": "Contraband", "price": "1.00", "unit": "each" }))
    .to_request();
  assert_eq!(test::call_service(&app, create).await.status(), StatusCode::FORBIDDEN);

  for path in [
    "/api/admin/reports/top-products",
    "/api/admin/reports/sales-summary",
    "/api/admin/reports/user-activity",
  ] {
    let as_buyer = test::TestRequest::get().uri(path).insert_header(bearer(&buyer)).to_request();
    assert_eq!(test::call_service(&app, as_buyer).await.status(), StatusCode::FORBIDDEN);
    let as_admin = test::TestRequest::get().uri(path).insert_header(bearer(&admin)).to_request();
    assert_eq!(test::call_service(&app, as_admin).await.status(), StatusCode::OK);
  }
}

#[actix_web::test]
async fn test_catalog_ownership_and_filters() {
  setup_tracing();
  let (_store, state) = memory_state();
  let app = init_app!(state);
  let owner = register!(app, "owner@farm.test", "seller");
  let rival = register!(app, "rival@farm.test", "seller");

  let create = test::TestRequest::post()
    .uri("/api/products")
    .insert_header(bearer(&owner))
    .set_json(json!({ "name": "Raw Honey", "price": "9.50", "unit": "jar", "category": "pantry", "organic": true }))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, create).await;
  let product_id = body["product"]["id"].as_str().unwrap().to_string();

  let negative = test::TestRequest::post()
    .uri("/api/products")
    .insert_header(bearer(&owner))
    .set_json(json!({ "name": "Free Money", "price": "-1.00", "unit": "each" }))
    .to_request();
  assert_eq!(test::call_service(&app, negative).await.status(), StatusCode::BAD_REQUEST);

  let hijack = test::TestRequest::put()
    .uri(&format!("/api/products/{}", product_id))
    .insert_header(bearer(&rival))
    .set_json(json!({ "price": "0.01" }))
    .to_request();
  assert_eq!(test::call_service(&app, hijack).await.status(), StatusCode::FORBIDDEN);

  let reprice = test::TestRequest::put()
    .uri(&format!("/api/products/{}", product_id))
    .insert_header(bearer(&owner))
    .set_json(json!({ "price": "11.00", "available": false }))
    .to_request();
  let resp = test::call_service(&app, reprice).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["product"]["price"], "11.00");

  let listed = test::TestRequest::get().uri("/api/products?category=pantry&availability=false").to_request();
  let body: Value = test::call_and_read_body_json(&app, listed).await;
  assert_eq!(body["products"].as_array().unwrap().len(), 1);

  let hidden = test::TestRequest::get().uri("/api/products?availability=true").to_request();
  let body: Value = test::call_and_read_body_json(&app, hidden).await;
  assert!(body["products"].as_array().unwrap().is_empty());

  let missing = test::TestRequest::get().uri(&format!("/api/products/{}", uuid::Uuid::new_v4())).to_request();
  assert_eq!(test::call_service(&app, missing).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_oversized_token_ttl_is_clamped_and_registration_works() {
  setup_tracing();
  let mut config = AppConfig::for_memory(TEST_TOKEN_SECRET);
  config.token_ttl_hours = 1_000_000_000_000;
  let (_store, state) = memory_state_with(config);
  assert_eq!(state.tokens.ttl(), chrono::Duration::hours(MAX_TOKEN_TTL_HOURS));
  let app = init_app!(state);

  let token = register!(app, "longlived@farm.test", "buyer");

  let me = test::TestRequest::get().uri("/api/auth/me").insert_header(bearer(&token)).to_request();
  let resp = test::call_service(&app, me).await;
  assert_eq!(resp.status(), StatusCode::OK);
}
