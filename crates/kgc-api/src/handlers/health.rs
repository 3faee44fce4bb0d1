//! Health check handlers
//!
//! Author: hephaex@gmail.com

use crate::state::{AppContext, EndpointMetrics};
use axum::{extract::State, response::IntoResponse, Json};
use kgc_core::DatasetSummary;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Liveness probe - basic health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub model: String,
    pub demo_mode: bool,
    pub dataset: DatasetSummary,
}

/// Readiness probe - the context only exists once model and dataset loaded
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Model and dataset loaded")
    )
)]
pub async fn readiness_check(State(state): State<Arc<AppContext>>) -> impl IntoResponse {
    Json(ReadinessResponse {
        ready: true,
        model: state.completer.predictor().name().to_string(),
        demo_mode: state.completer.demo_mode(),
        dataset: state.dataset.summary(),
    })
}

/// JSON metrics response
#[derive(Serialize)]
pub struct MetricsResponse {
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub requests_per_second: f64,
    pub endpoints: BTreeMap<String, EndpointMetrics>,
}

/// Request counts per endpoint and status
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "health",
    responses(
        (status = 200, description = "Request statistics")
    )
)]
pub async fn metrics(State(state): State<Arc<AppContext>>) -> impl IntoResponse {
    let uptime = state.uptime_secs();
    let total_requests = state.get_request_count();
    let rps = if uptime > 0 {
        total_requests as f64 / uptime as f64
    } else {
        0.0
    };

    Json(MetricsResponse {
        uptime_seconds: uptime,
        total_requests,
        requests_per_second: rps,
        endpoints: state.metrics_snapshot().await,
    })
}
