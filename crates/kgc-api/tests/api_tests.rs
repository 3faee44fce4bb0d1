//! API Integration Tests
//!
//! Runs the router against the in-memory toy context (four capitals/countries,
//! TransE in two dimensions), so no files or network are needed.
//!
//! Author: hephaex@gmail.com

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use kgc_api::testing::{context_over, toy_dataset, toy_model};
use kgc_api::{create_router, create_router_for_testing, state::AppContext};
use kgc_core::config::AppConfig;
use kgc_core::{Candidate, LinkPredictor, Triple, TripleQuery, TriplesFactory};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request and decode the JSON body
async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

async fn post_kgc(body: Value) -> (StatusCode, Value) {
    send(
        create_router_for_testing(),
        create_json_request("POST", "/kgc", Some(body)),
    )
    .await
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let (status, json) = send(
        create_router_for_testing(),
        create_json_request("GET", "/health", None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let (status, json) = send(
        create_router_for_testing(),
        create_json_request("GET", "/ready", None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert_eq!(json["demo_mode"], false);
    assert_eq!(json["model"], "transe-2d");
    assert_eq!(json["dataset"]["num_entities"], 4);
    assert_eq!(json["dataset"]["num_relations"], 2);
    assert_eq!(json["dataset"]["training_triples"], 3);
    assert_eq!(json["dataset"]["testing_triples"], 2);
}

#[tokio::test]
async fn test_metrics_counts_requests_per_endpoint() {
    let app = create_router_for_testing();

    let (status, _) = send(
        app.clone(),
        create_json_request(
            "POST",
            "/kgc",
            Some(json!({"head": "Paris", "relation": "capital_of", "tail": ""})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(app, create_json_request("GET", "/metrics", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["uptime_seconds"].is_number());
    assert_eq!(json["total_requests"], 1);
    assert_eq!(json["endpoints"]["/kgc"]["requests"], 1);
    assert_eq!(json["endpoints"]["/kgc"]["status_counts"]["200"], 1);
}

#[tokio::test]
async fn test_openapi_document() {
    let (status, json) = send(
        create_router_for_testing(),
        create_json_request("GET", "/api-docs/openapi.json", None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/kgc"].is_object());
    assert!(json["paths"]["/ner"].is_object());
}

// =============================================================================
// Triple Completion Tests
// =============================================================================

#[tokio::test]
async fn test_kgc_predicts_tail() {
    let (status, json) = post_kgc(json!({
        "head": "Paris",
        "relation": "capital_of",
        "tail": ""
    }))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["code"], 0);
    assert_eq!(json["msg"], "success");
    assert_eq!(json["head"], "Paris");
    assert_eq!(json["relation"], "capital_of");
    assert_eq!(json["tail"], "France");
}

#[tokio::test]
async fn test_kgc_predicts_head() {
    let (status, json) = post_kgc(json!({
        "head": "",
        "relation": "capital_of",
        "tail": "Germany"
    }))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["head"], "Berlin");
}

#[tokio::test]
async fn test_kgc_predicts_relation() {
    let (status, json) = post_kgc(json!({
        "head": "France",
        "relation": "",
        "tail": "Germany"
    }))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["relation"], "neighbor_of");
}

#[tokio::test]
async fn test_kgc_complete_triple_is_identity() {
    let (status, json) = post_kgc(json!({
        "head": "Paris",
        "relation": "neighbor_of",
        "tail": "Berlin"
    }))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["head"], "Paris");
    assert_eq!(json["relation"], "neighbor_of");
    assert_eq!(json["tail"], "Berlin");
}

#[tokio::test]
async fn test_kgc_missing_field_counts_as_empty() {
    let (status, json) = post_kgc(json!({
        "head": "Berlin",
        "relation": "capital_of"
    }))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tail"], "Germany");
}

#[tokio::test]
async fn test_kgc_rejects_two_empty_fields() {
    let (status, json) = post_kgc(json!({
        "head": "Paris",
        "relation": "",
        "tail": ""
    }))
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], -1);
    assert!(json["msg"].as_str().unwrap().contains("relation"));
}

#[tokio::test]
async fn test_kgc_unknown_entity() {
    let (status, json) = post_kgc(json!({
        "head": "Atlantis",
        "relation": "capital_of",
        "tail": ""
    }))
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], -1);
    assert!(json["msg"].as_str().unwrap().contains("Atlantis"));
}

#[tokio::test]
async fn test_kgc_unknown_relation() {
    let (status, json) = post_kgc(json!({
        "head": "Paris",
        "relation": "twinned_with",
        "tail": ""
    }))
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], -1);
}

#[tokio::test]
async fn test_kgc_malformed_json() {
    let request = Request::builder()
        .method("POST")
        .uri("/kgc")
        .header("Content-Type", "application/json")
        .body(Body::from("{\"head\": \"Paris\","))
        .unwrap();

    let (status, json) = send(create_router_for_testing(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], -1);
    assert!(json["msg"].is_string());
}

#[tokio::test]
async fn test_kgc_missing_content_type() {
    let request = Request::builder()
        .method("POST")
        .uri("/kgc")
        .body(Body::from("{}"))
        .unwrap();

    let (status, json) = send(create_router_for_testing(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], -1);
}

#[tokio::test]
async fn test_predict_top_k() {
    let (status, json) = send(
        create_router_for_testing(),
        create_json_request(
            "POST",
            "/kgc/predict",
            Some(json!({
                "head": "Paris",
                "relation": "capital_of",
                "tail": "",
                "top_k": 2
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["code"], 0);
    assert_eq!(json["target"], "tail");

    let candidates = json["candidates"].as_array().unwrap();
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0]["label"], "France");
    assert!(candidates[0]["score"].as_f64().unwrap() >= candidates[1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn test_predict_rejects_zero_top_k() {
    let (status, json) = send(
        create_router_for_testing(),
        create_json_request(
            "POST",
            "/kgc/predict",
            Some(json!({"head": "Paris", "relation": "capital_of", "top_k": 0})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], -1);
}

#[tokio::test]
async fn test_benchmark_is_computed_once() {
    let ctx = Arc::new(kgc_api::testing::toy_context());
    let app = create_router(ctx.clone());
    assert!(ctx.benchmark.get().is_none());

    for _ in 0..2 {
        let (status, json) = send(
            app.clone(),
            create_json_request("GET", "/kgc/benchmark", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["mrr"], 1.0);
    }
    assert_eq!(ctx.benchmark.get(), Some(&(1.0, 1.0)));
}

#[tokio::test]
async fn test_benchmark() {
    let (status, json) = send(
        create_router_for_testing(),
        create_json_request("GET", "/kgc/benchmark", None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["code"], 0);
    assert_eq!(json["hits_at_1"], 1.0);
    assert_eq!(json["mrr"], 1.0);
}

// =============================================================================
// Demo Mode and Timeout Tests
// =============================================================================

/// Answers correctly, but only after the request deadline has passed
struct SlowPredictor;

impl LinkPredictor for SlowPredictor {
    fn rank_candidates(&self, _query: &TripleQuery) -> kgc_core::Result<Vec<Candidate>> {
        std::thread::sleep(Duration::from_millis(1500));
        Ok(vec![Candidate::new("France", 0.0)])
    }

    fn score(&self, _triple: &Triple) -> kgc_core::Result<f32> {
        Ok(0.0)
    }

    fn name(&self) -> &str {
        "slow"
    }
}

#[tokio::test]
async fn test_kgc_model_timeout() {
    let mut config = AppConfig::default();
    config.server.request_timeout_secs = 1;
    let ctx = context_over(config, toy_dataset(), Arc::new(SlowPredictor));

    let (status, json) = send(
        create_router(Arc::new(ctx)),
        create_json_request(
            "POST",
            "/kgc",
            Some(json!({"head": "Paris", "relation": "capital_of", "tail": ""})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["code"], -1);
    assert!(json["msg"].as_str().unwrap().contains("timed out"));
}

/// Toy context whose testing split claims Paris is the capital of Germany
fn demo_context(entity_probability: f64) -> AppContext {
    let mut dataset = toy_dataset();
    dataset.testing = TriplesFactory::from_triples_with_vocabulary(
        &[Triple::new("Paris", "capital_of", "Germany")],
        dataset.vocabulary().clone(),
    )
    .unwrap();
    let model = Arc::new(toy_model(&dataset));

    let mut config = AppConfig::default();
    config.inference.demo_mode = true;
    config.inference.entity_substitution_probability = entity_probability;
    context_over(config, dataset, model)
}

#[tokio::test]
async fn test_demo_mode_returns_testing_label() {
    let app = create_router(Arc::new(demo_context(1.0)));

    let (status, json) = send(
        app.clone(),
        create_json_request(
            "POST",
            "/kgc",
            Some(json!({"head": "Paris", "relation": "capital_of", "tail": ""})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tail"], "Germany");

    let (_, json) = send(app, create_json_request("GET", "/ready", None)).await;
    assert_eq!(json["demo_mode"], true);
}

#[tokio::test]
async fn test_demo_mode_without_substitution_keeps_model_answer() {
    let (status, json) = send(
        create_router(Arc::new(demo_context(0.0))),
        create_json_request(
            "POST",
            "/kgc",
            Some(json!({"head": "Paris", "relation": "capital_of", "tail": ""})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tail"], "France");
}

// =============================================================================
// NER Tests
// =============================================================================

#[tokio::test]
async fn test_ner_tags_vocabulary_entities() {
    let (status, json) = send(
        create_router_for_testing(),
        create_json_request(
            "POST",
            "/ner",
            Some(json!({"text": "Paris is the capital of France."})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["code"], 0);
    assert_eq!(json["msg"], "success");

    let annotations: Value = serde_json::from_str(json["text"].as_str().unwrap()).unwrap();
    let texts: Vec<&str> = annotations
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["Paris", "France"]);
    assert_eq!(annotations[0]["entity_type"], "Entity");
    assert_eq!(annotations[0]["start"], 0);
}

#[tokio::test]
async fn test_ner_empty_text() {
    let (status, json) = send(
        create_router_for_testing(),
        create_json_request("POST", "/ner", Some(json!({"text": ""}))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["text"], "[]");
}

#[tokio::test]
async fn test_ner_malformed_json() {
    let request = Request::builder()
        .method("POST")
        .uri("/ner")
        .header("Content-Type", "application/json")
        .body(Body::from("not json"))
        .unwrap();

    let (status, json) = send(create_router_for_testing(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], -1);
}

// =============================================================================
// Routing Tests
// =============================================================================

#[tokio::test]
async fn test_unknown_endpoint() {
    let (status, json) = send(
        create_router_for_testing(),
        create_json_request("GET", "/api/v1/query", None),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], -1);
}

#[tokio::test]
async fn test_wrong_method_returns_json_error() {
    let (status, json) = send(
        create_router_for_testing(),
        create_json_request("GET", "/kgc", None),
    )
    .await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["code"], -1);
    assert!(json["msg"].as_str().unwrap().contains("/kgc"));
}
