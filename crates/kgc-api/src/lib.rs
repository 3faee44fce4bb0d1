//! KGC API - HTTP server
//!
//! Serves triple completion and named entity recognition over a model that is
//! loaded once at startup and shared read-only.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use axum::{
    http::{header, HeaderValue, Method, Uri},
    routing::{get, post},
    Json, Router,
};
use error::AppError;
use handlers::{health, kgc, ner};
use kgc_core::config::ServerConfig;
use state::AppContext;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

/// OpenAPI document
#[derive(OpenApi)]
#[openapi(
    info(
        title = "KGC API",
        description = "Knowledge graph completion and named entity recognition"
    ),
    paths(
        ner::ner_handler,
        kgc::kgc_handler,
        kgc::predict_handler,
        kgc::benchmark_handler,
        health::health_check,
        health::readiness_check,
        health::metrics,
    ),
    components(schemas(
        error::ApiError,
        ner::NerRequest,
        ner::NerResponse,
        kgc::KgcRequest,
        kgc::KgcResponse,
        kgc::PredictRequest,
        kgc::PredictResponse,
        kgc::CandidateView,
        kgc::BenchmarkResponse,
        health::HealthResponse,
    )),
    tags(
        (name = "kgc", description = "Triple completion"),
        (name = "ner", description = "Named entity recognition"),
        (name = "health", description = "Liveness, readiness and metrics")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn not_found() -> AppError {
    AppError::NotFound("No such endpoint".to_string())
}

async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    AppError::MethodNotAllowed(format!("Method {method} not allowed on {}", uri.path()))
}

/// Build the application router over a loaded context
pub fn create_router(state: Arc<AppContext>) -> Router {
    let router = Router::new()
        .route("/ner", post(ner::ner_handler))
        .route("/kgc", post(kgc::kgc_handler))
        .route("/kgc/predict", post(kgc::predict_handler))
        .route("/kgc/benchmark", get(kgc::benchmark_handler))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .route("/api-docs/openapi.json", get(openapi_json))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http());

    let router = match cors_layer(&state.config.server) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

/// Router over the in-memory toy context, for integration tests
#[cfg(feature = "test-utils")]
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(testing::toy_context()))
}

fn cors_layer(config: &ServerConfig) -> Option<CorsLayer> {
    if !config.cors_enabled {
        return None;
    }
    if config.cors_origins.is_empty() {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_disabled() {
        let config = ServerConfig {
            cors_enabled: false,
            ..Default::default()
        };
        assert!(cors_layer(&config).is_none());
    }

    #[test]
    fn test_cors_origin_list() {
        let config = ServerConfig {
            cors_origins: vec!["http://localhost:3000".to_string(), "bad\norigin".to_string()],
            ..Default::default()
        };
        assert!(cors_layer(&config).is_some());
    }

    #[test]
    fn test_openapi_lists_endpoints() {
        let doc = ApiDoc::openapi();
        for path in ["/ner", "/kgc", "/kgc/predict", "/kgc/benchmark", "/health"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
