//! HTTP control surface for the trading engine.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};

use crate::engine::error::StartError;
use crate::engine::orchestrator::StrategyOrchestrator;
use crate::metrics::Metrics;
use crate::models::strategy::StatusInfo;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<StrategyOrchestrator>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub health: Arc<RwLock<HealthStatus>>,
}

#[derive(Clone, Debug)]
pub struct HealthStatus {
    pub status: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let health = state.health.read().await;
    Json(json!({
        "status": health.status,
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "service": "macdrix-trader"
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Request accounting for every route.
async fn metrics_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(started.elapsed().as_secs_f64());

    if response.status().is_server_error() {
        error!(
            path = %path,
            status = %response.status(),
            duration_ms = started.elapsed().as_millis(),
            "HTTP request error"
        );
    }
    response
}

async fn start_strategy(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.orchestrator.start().await {
        Ok(name) => (
            StatusCode::OK,
            Json(json!({ "success": true, "strategy_name": name })),
        ),
        Err(e) => {
            error!(error = %e, "Strategy start rejected");
            (
                start_error_status(&e),
                Json(json!({ "success": false, "error": e.to_string() })),
            )
        }
    }
}

fn start_error_status(e: &StartError) -> StatusCode {
    match e {
        StartError::AlreadyActive | StartError::ActiveRunRecorded(_) => StatusCode::CONFLICT,
        StartError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        StartError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        StartError::Connectivity(_)
        | StartError::Leverage(_)
        | StartError::DryRunSizing(_)
        | StartError::Feed(_) => StatusCode::BAD_GATEWAY,
    }
}

async fn stop_strategy(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.orchestrator.stop("api request").await {
        Ok(name) => (
            StatusCode::OK,
            Json(json!({ "success": true, "strategy_name": name })),
        ),
        Err(e) => (
            StatusCode::CONFLICT,
            Json(json!({ "success": false, "error": e.to_string() })),
        ),
    }
}

async fn strategy_status(State(state): State<AppState>) -> Json<StatusInfo> {
    Json(state.orchestrator.get_status().await)
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/strategy/start", post(start_strategy))
        .route("/strategy/stop", post(stop_strategy))
        .route("/strategy/status", get(strategy_status))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn start_server(port: u16, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!(port, "HTTP server listening on port {}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
