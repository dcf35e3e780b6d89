//! Integration tests for the storefront API
//!
//! These tests drive the full router against a temporary database:
//! - catalog reads
//! - checkout, stock accounting and rollback
//! - order history, cancellation and per-product lookups
//! - error handling

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use ecommerce::auth::TokenKeys;
use ecommerce::catalog;
use ecommerce::database::{init_db, AppState};
use ecommerce::model::Product;
use ecommerce::route::{create_app, trim_trailing_slash};

fn product(id: &str, name: &str, price: Decimal, stock: u32) -> Product {
    Product {
        product_id: id.to_string(),
        product_name: Some(name.to_string()),
        price,
        stock,
        category: Some("home".to_string()),
        is_new_release: false,
        is_trending: true,
        rating: 4,
        description: None,
        detail: None,
        eco_point: 2,
        img_url: None,
    }
}

/// Helper function to create a test application with a temporary database
///
/// Seeds P1 (10.00, stock 5) and P2 (2.50, stock 1).
fn setup_test_app() -> (Router, AppState, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db = init_db(temp_db.path().to_str().unwrap()).expect("Failed to initialize test database");
    let state = AppState::new(db, TokenKeys::new("test-secret", Duration::hours(24)));

    catalog::upsert_product(&state.db, &product("P1", "Bamboo brush", Decimal::new(1000, 2), 5))
        .unwrap();
    catalog::upsert_product(&state.db, &product("P2", "Soap bar", Decimal::new(250, 2), 1))
        .unwrap();

    (create_app(state.clone()), state, temp_db)
}

/// Helper function to parse response body as JSON
async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, response_json(response.into_body()).await)
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, payload: &Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

async fn stock_of(app: &Router, product_id: &str) -> u64 {
    let (status, body) = send(app, get(&format!("/api/product/byId/{product_id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["stock"].as_u64().unwrap()
}

/// Registers `username` and returns a fresh login token
async fn login_as(app: &Router, username: &str) -> String {
    let register = json!({
        "username": username,
        "email": format!("{username}@example.com"),
        "password": "long enough pw",
        "confirm_password": "long enough pw",
    });
    let (status, _) = send(app, post("/api/register", &register, None)).await;
    assert_eq!(status, StatusCode::CREATED);

    let login = json!({ "username": username, "password": "long enough pw" });
    let (status, body) = send(app, post("/api/login", &login, None)).await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_list_products() {
    let (app, _state, _temp_db) = setup_test_app();

    let (status, body) = send(&app, get("/api/product/all", None)).await;

    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["product_id"], "P1");
    assert_eq!(data[0]["price"], "10.00");
}

#[tokio::test]
async fn test_get_product_not_found() {
    let (app, _state, _temp_db) = setup_test_app();

    let (status, body) = send(&app, get("/api/product/byId/NOPE", None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_guest_checkout_totals_and_stock() {
    let (app, _state, _temp_db) = setup_test_app();

    let payload = json!({
        "first_name": "Guest",
        "address": "1 Main Road",
        "shipping_method": "fd",
        "payment_method": "cod",
        "items": [{ "product_id": "P1", "quantity": 2 }]
    });
    let (status, body) = send(&app, post("/api/orders/checkout", &payload, None)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["subtotal"], "20.00");
    assert_eq!(body["shipping_fee"], "80.00");
    assert_eq!(body["total_amount"], "100.00");
    assert_eq!(body["status"], "pending");
    assert!(body["user"].is_null());

    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_name"], "Bamboo brush");
    assert_eq!(items[0]["price"], "10.00");
    assert_eq!(items[0]["quantity"], 2);

    assert_eq!(stock_of(&app, "P1").await, 3);
}

#[tokio::test]
async fn test_checkout_non_cod_is_paid() {
    let (app, _state, _temp_db) = setup_test_app();

    let payload = json!({
        "payment_method": "credit_card",
        "items": [{ "product_id": "P2", "quantity": 1 }]
    });
    let (status, body) = send(&app, post("/api/orders/checkout", &payload, None)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "paid");
    assert_eq!(body["shipping_method"], "sd");
    assert_eq!(body["shipping_fee"], "50.00");
    assert_eq!(body["total_amount"], "52.50");
}

#[tokio::test]
async fn test_checkout_without_items_creates_nothing() {
    let (app, _state, _temp_db) = setup_test_app();

    let payload = json!({ "first_name": "Guest", "items": [] });
    let (status, body) = send(&app, post("/api/orders/checkout", &payload, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No items provided");

    let (_, summary) = send(&app, get("/api/summarize", None)).await;
    assert_eq!(summary["total_orders"], 0);
}

#[tokio::test]
async fn test_checkout_incomplete_item() {
    let (app, _state, _temp_db) = setup_test_app();

    let payload = json!({ "items": [{ "product_id": "P1" }] });
    let (status, body) = send(&app, post("/api/orders/checkout", &payload, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Each item requires a product_id and a quantity");
}

#[tokio::test]
async fn test_checkout_unknown_product_rolls_back() {
    let (app, _state, _temp_db) = setup_test_app();

    let payload = json!({
        "items": [
            { "product_id": "P1", "quantity": 1 },
            { "product_id": "MISSING", "quantity": 1 }
        ]
    });
    let (status, _) = send(&app, post("/api/orders/checkout", &payload, None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(stock_of(&app, "P1").await, 5);

    let (_, summary) = send(&app, get("/api/summarize", None)).await;
    assert_eq!(summary["total_orders"], 0);
}

#[tokio::test]
async fn test_checkout_rejects_overselling() {
    let (app, _state, _temp_db) = setup_test_app();

    let payload = json!({ "items": [{ "product_id": "P2", "quantity": 2 }] });
    let (status, _) = send(&app, post("/api/orders/checkout", &payload, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(stock_of(&app, "P2").await, 1);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (app, _state, _temp_db) = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/orders/checkout")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_history_requires_login() {
    let (app, _state, _temp_db) = setup_test_app();

    let (status, body) = send(&app, get("/api/orders", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");
}

#[tokio::test]
async fn test_create_order_requires_login() {
    let (app, _state, _temp_db) = setup_test_app();

    let payload = json!({ "items": [{ "product_id": "P1", "quantity": 1 }] });
    let (status, _) = send(&app, post("/api/orders", &payload, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(stock_of(&app, "P1").await, 5);
}

#[tokio::test]
async fn test_order_history_and_lookup() {
    let (app, _state, _temp_db) = setup_test_app();
    let token = login_as(&app, "alice").await;

    let first = json!({ "items": [{ "product_id": "P1", "quantity": 1 }] });
    let (status, placed) = send(&app, post("/api/orders", &first, Some(&token))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(placed["user"].is_number());

    let second = json!({ "items": [{ "product_id": "P2", "quantity": 1 }] });
    let (status, latest) = send(&app, post("/api/orders/checkout", &second, Some(&token))).await;
    assert_eq!(status, StatusCode::CREATED);

    // A guest order must not show up in alice's history
    let (status, _) = send(&app, post("/api/orders/checkout", &first, None)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, get("/api/orders", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let orders = body["data"].as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["id"], latest["id"]);
    assert_eq!(orders[1]["id"], placed["id"]);

    let uri = format!("/api/orders/{}", placed["id"]);
    let (status, body) = send(&app, get(&uri, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["product_id"], "P1");

    let bob = login_as(&app, "bob").await;
    let (status, _) = send(&app, get(&uri, Some(&bob))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_order_restores_stock() {
    let (app, _state, _temp_db) = setup_test_app();
    let token = login_as(&app, "carol").await;

    let payload = json!({ "items": [{ "product_id": "P1", "quantity": 3 }] });
    let (_, placed) = send(&app, post("/api/orders", &payload, Some(&token))).await;
    assert_eq!(stock_of(&app, "P1").await, 2);

    let uri = format!("/api/orders/{}/cancel", placed["id"]);
    let (status, body) = send(&app, post(&uri, &json!({}), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(stock_of(&app, "P1").await, 5);

    let (status, _) = send(&app, post(&uri, &json!({}), Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(stock_of(&app, "P1").await, 5);
}

#[tokio::test]
async fn test_orders_by_product() {
    let (app, _state, _temp_db) = setup_test_app();

    for quantity in [1, 2] {
        let payload = json!({ "items": [{ "product_id": "P1", "quantity": quantity }] });
        let (status, _) = send(&app, post("/api/orders/checkout", &payload, None)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, get("/api/order/byProductId/P1", None)).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|item| item["product_id"] == "P1"));

    let (_, body) = send(&app, get("/api/order/byProductId/P2", None)).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_summarize_counts() {
    let (app, _state, _temp_db) = setup_test_app();
    login_as(&app, "dave").await;

    let payload = json!({ "items": [{ "product_id": "P1", "quantity": 1 }] });
    send(&app, post("/api/orders/checkout", &payload, None)).await;

    let (status, body) = send(&app, get("/api/summarize", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_users"], 1);
    assert_eq!(body["total_products"], 2);
    assert_eq!(body["total_orders"], 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_never_oversell() {
    let (app, state, _temp_db) = setup_test_app();

    // P1 has 5 in stock; 12 buyers race for one unit each
    let mut handles = Vec::new();
    for _ in 0..12 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let payload = json!({ "items": [{ "product_id": "P1", "quantity": 1 }] });
            let (status, _) = send(&app, post("/api/orders/checkout", &payload, None)).await;
            status
        }));
    }

    let mut placed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::CREATED => placed += 1,
            status => assert_eq!(status, StatusCode::BAD_REQUEST),
        }
    }

    assert_eq!(placed, 5);
    assert_eq!(stock_of(&app, "P1").await, 0);
    assert_eq!(catalog::summarize(&state.db).unwrap().total_orders, 5);
}

#[tokio::test]
async fn test_trailing_slash_paths_are_routed() {
    let (app, _state, _temp_db) = setup_test_app();
    let app = trim_trailing_slash(app);

    let payload = json!({ "items": [{ "product_id": "P1", "quantity": 1 }] });
    let response = app
        .clone()
        .oneshot(post("/api/orders/checkout/", &payload, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.oneshot(get("/api/product/all/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["data"][0]["stock"], 4);
}

#[tokio::test]
async fn test_expired_token_on_checkout_is_rejected() {
    let (app, state, _temp_db) = setup_test_app();
    let expired = state
        .keys
        .issue_until(1, "late", Utc::now() - Duration::hours(2))
        .unwrap();

    let payload = json!({ "items": [{ "product_id": "P1", "quantity": 1 }] });
    let (status, body) = send(&app, post("/api/orders/checkout", &payload, Some(&expired))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token expired");
    assert_eq!(stock_of(&app, "P1").await, 5);

    let (status, body) = send(&app, get("/api/carts/current", Some("not.a.jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");
}
