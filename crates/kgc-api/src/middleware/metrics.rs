//! Metrics tracking middleware
//!
//! Tracks request counts, latency, and status codes per endpoint
//!
//! Author: hephaex@gmail.com

use crate::state::AppContext;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

/// Metrics tracking middleware
///
/// Records:
/// - Total request count
/// - Request count and latency per endpoint
/// - Response status codes
pub async fn metrics_middleware(
    State(state): State<Arc<AppContext>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let endpoint = endpoint_label(&request);

    let response = next.run(request).await;

    let latency_us = start.elapsed().as_micros() as u64;
    state.increment_requests();
    state
        .record_request(endpoint, response.status().as_u16(), latency_us)
        .await;

    response
}

/// Route template when matched, so unknown paths share one bucket
fn endpoint_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}
