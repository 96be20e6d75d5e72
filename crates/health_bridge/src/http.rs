//! HTTP surface of the bridge: health, Prometheus metrics and the method channel.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::timeout::TimeoutLayer;

use crate::channel::{MethodCall, MethodChannel, MethodResponse};
use crate::observability::Health;
use crate::orchestrator::AcquisitionScope;

pub struct AppState {
    pub channel: MethodChannel,
    pub metrics: PrometheusHandle,
    pub scope: AcquisitionScope,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if Health::readiness(&state.scope).ready {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting down")
    }
}

async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state.metrics.render();
    ([("content-type", "text/plain; version=0.0.4")], body)
}

async fn call_method(
    State(state): State<Arc<AppState>>,
    Json(call): Json<MethodCall>,
) -> Result<Json<MethodResponse>, (StatusCode, String)> {
    state
        .channel
        .handle(&call)
        .await
        .map(Json)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}

/// `request_timeout` should exceed the consent timeout so a pending prompt
/// is never cut off by the HTTP layer first.
pub fn router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/channel", post(call_method))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
