//! HTTP surface: status codes, JSON bodies and request tracking

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use bingo_settlement::{api::create_app, config::ApiConfig, DrawEngine, DrawStore, EngineConfig};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

fn app() -> (TempDir, Router) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DrawStore::open_path(dir.path()).expect("open store");
    let engine = DrawEngine::with_store(store, EngineConfig::default()).expect("engine");
    (dir, create_app(&ApiConfig::default(), engine))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn create_manual_draw(app: &Router) -> String {
    let (status, draw) = send(
        app,
        "POST",
        "/draws",
        Some(json!({
            "name": "Evening",
            "scheduled_at": "2030-01-01T20:00:00Z",
            "card_price": 200,
            "payout": { "type": "fixed", "quadra": 100, "quina": 300, "cheia": 1000 },
            "mode": "manual"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(draw["status"], "waiting");
    draw["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_request_id() {
    let (_dir, app) = app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn test_missing_draw_is_404_with_error_body() {
    let (_dir, app) = app();
    let (status, body) = send(&app, "GET", "/draws/nope", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn test_invalid_draw_is_rejected() {
    let (_dir, app) = app();
    let (status, body) = send(
        &app,
        "POST",
        "/draws",
        Some(json!({
            "name": "Free",
            "scheduled_at": "2030-01-01T20:00:00Z",
            "card_price": 0,
            "payout": { "type": "accumulated" },
            "mode": "automatic"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_draw_operations_over_http() {
    let (_dir, app) = app();
    let draw_id = create_manual_draw(&app).await;

    // Not started yet
    let (status, _) = send(&app, "POST", &format!("/draws/{}/numbers", draw_id), Some(json!({ "number": 5 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, draw) = send(&app, "POST", &format!("/draws/{}/start", draw_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(draw["status"], "active");

    let (status, progress) =
        send(&app, "POST", &format!("/draws/{}/numbers", draw_id), Some(json!({ "number": 5 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["drawn_count"], 1);
    assert_eq!(progress["winners"], json!([]));
    assert!(progress.get("settlement_error").is_none());

    let (status, _) = send(&app, "POST", &format!("/draws/{}/numbers", draw_id), Some(json!({ "number": 5 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "POST", &format!("/draws/{}/numbers", draw_id), Some(json!({ "number": 99 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, settle) = send(&app, "POST", &format!("/draws/{}/settle", draw_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settle["winner"], Value::Null);

    let (status, list) = send(&app, "GET", "/draws?status=active", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["drawn_count"], 1);

    let (status, draw) = send(&app, "POST", &format!("/draws/{}/finish", draw_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(draw["status"], "finished");

    let (_, payouts) = send(&app, "GET", &format!("/draws/{}/payouts", draw_id), None).await;
    assert_eq!(payouts, json!([]));
}

#[tokio::test]
async fn test_accounts_and_purchases_over_http() {
    let (_dir, app) = app();
    let draw_id = create_manual_draw(&app).await;

    let (status, account) = send(&app, "POST", "/accounts", Some(json!({ "name": "Dora" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = account["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/draws/{}/purchases", draw_id),
        Some(json!({ "user_id": user_id, "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, account) = send(
        &app,
        "POST",
        &format!("/accounts/{}/deposits", user_id),
        Some(json!({ "amount": 1000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(account["balance"], 1000);

    let (status, purchase) = send(
        &app,
        "POST",
        &format!("/draws/{}/purchases", draw_id),
        Some(json!({ "user_id": user_id, "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(purchase["total_amount"], 400);
    assert_eq!(purchase["card_ids"].as_array().unwrap().len(), 2);

    let (_, cards) = send(&app, "GET", &format!("/draws/{}/cards", draw_id), None).await;
    assert_eq!(cards.as_array().unwrap().len(), 2);

    let (_, account) = send(&app, "GET", &format!("/accounts/{}", user_id), None).await;
    assert_eq!(account["balance"], 600);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/accounts/{}/withdrawals", user_id),
        Some(json!({ "amount": 601 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint_exports_counters() {
    let (_dir, app) = app();
    let draw_id = create_manual_draw(&app).await;
    send(&app, "POST", &format!("/draws/{}/start", draw_id), None).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("bingo_draws_started_total 1"));
}

#[tokio::test]
async fn test_metrics_endpoint_can_be_disabled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DrawStore::open_path(dir.path()).expect("open store");
    let mut config = EngineConfig::default();
    config.monitoring.enable_metrics = false;
    let engine = DrawEngine::with_store(store, config).expect("engine");
    let app = create_app(&ApiConfig::default(), engine);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}
