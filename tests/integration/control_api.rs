//! Integration tests for the HTTP control surface
//!
//! Drives the orchestrator through the router the binary serves, over a paper
//! exchange and a scripted candle source.

use super::test_utils::{settings, TestApp, SYMBOL};
use macdrix::models::strategy::{SizingRule, StrategySettings};
use serde_json::Value;

#[tokio::test]
async fn health_endpoint_reports_the_service() {
    let app = TestApp::new().await;
    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_seconds"].as_u64().is_some());
    assert_eq!(body["service"], "macdrix-trader");
}

#[tokio::test]
async fn metrics_endpoint_exposes_engine_and_http_series() {
    let app = TestApp::new().await;
    let _ = app.server.get("/health").await;

    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    assert!(body.contains("http_requests_total"));
    assert!(body.contains("http_request_duration_seconds"));
    assert!(body.contains("http_requests_in_flight"));
    assert!(body.contains("signals_received_total"));
    assert!(body.contains("strategy_active"));
}

#[tokio::test]
async fn start_endpoint_launches_the_strategy() {
    let app = TestApp::new().await;

    let response = app.server.post("/strategy/start").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["strategy_name"], "BTCUSDT_1m_macd-cross");
    assert!(app.orchestrator.is_active().await);

    let metrics = app.server.get("/metrics").await.text();
    assert!(metrics.contains("strategy_active 1"));
}

#[tokio::test]
async fn second_start_returns_conflict() {
    let app = TestApp::new().await;
    let first = app.server.post("/strategy/start").await;
    assert_eq!(first.status_code(), 200);

    let response = app.server.post("/strategy/start").await;
    assert_eq!(response.status_code(), 409);

    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap_or("")
        .contains("already running"));
}

#[tokio::test]
async fn status_endpoint_tracks_the_run() {
    let app = TestApp::new().await;

    let response = app.server.get("/strategy/status").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["active"], false);
    assert_eq!(body["position_state"], "Flat");

    let start = app.server.post("/strategy/start").await;
    assert_eq!(start.status_code(), 200);

    let body: Value = app.server.get("/strategy/status").await.json();
    assert_eq!(body["active"], true);
    assert_eq!(body["strategy_name"], "BTCUSDT_1m_macd-cross");
    assert_eq!(body["symbol"], SYMBOL);
    assert_eq!(body["timeframe"], "1m");
    assert_eq!(body["strategy_state"], "WaitingFirstSignal");
}

#[tokio::test]
async fn stop_endpoint_halts_the_strategy() {
    let app = TestApp::new().await;
    let start = app.server.post("/strategy/start").await;
    assert_eq!(start.status_code(), 200);

    let response = app.server.post("/strategy/stop").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["strategy_name"], "BTCUSDT_1m_macd-cross");
    assert!(!app.orchestrator.is_active().await);

    let again = app.server.post("/strategy/stop").await;
    assert_eq!(again.status_code(), 409);
    let body: Value = again.json();
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap_or("")
        .contains("no strategy is running"));
}

#[tokio::test]
async fn invalid_settings_fail_with_bad_request() {
    let app = TestApp::with_settings(StrategySettings {
        leverage: 0,
        ..settings()
    })
    .await;

    let response = app.server.post("/strategy/start").await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(!app.orchestrator.is_active().await);
}

#[tokio::test]
async fn venue_failures_surface_as_bad_gateway() {
    let app = TestApp::with_settings(StrategySettings {
        sizing: SizingRule::Percentage(10.0),
        ..settings()
    })
    .await;
    // Percentage sizing cannot be dry-run against an empty account.
    app.paper.set_balance(0.0, 0.0).await;

    let response = app.server.post("/strategy/start").await;
    assert_eq!(response.status_code(), 502);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(!app.orchestrator.is_active().await);
}
