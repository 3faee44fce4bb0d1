//! Triple completion handlers
//!
//! Author: hephaex@gmail.com

use crate::error::{AppError, CODE_SUCCESS};
use crate::handlers::run_blocking;
use crate::state::AppContext;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use kgc_core::{Candidate, TripleQuery};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Triple with at most one empty element
#[derive(Debug, Deserialize, ToSchema)]
pub struct KgcRequest {
    #[schema(example = "Paris")]
    #[serde(default)]
    pub head: String,
    #[schema(example = "capital_of")]
    #[serde(default)]
    pub relation: String,
    /// Leave empty to predict the tail
    #[schema(example = "")]
    #[serde(default)]
    pub tail: String,
}

impl KgcRequest {
    fn query(&self) -> TripleQuery {
        TripleQuery::from_labels(&self.head, &self.relation, &self.tail)
    }
}

/// Completed triple
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct KgcResponse {
    #[schema(example = 0)]
    pub code: i32,
    #[schema(example = "success")]
    pub msg: String,
    #[schema(example = "Paris")]
    pub head: String,
    #[schema(example = "capital_of")]
    pub relation: String,
    #[schema(example = "France")]
    pub tail: String,
}

/// Complete a triple by filling its single empty element
#[utoipa::path(
    post,
    path = "/kgc",
    tag = "kgc",
    request_body = KgcRequest,
    responses(
        (status = 200, description = "Completed triple", body = KgcResponse),
        (status = 400, description = "More than one empty element", body = crate::error::ApiError),
        (status = 404, description = "Unknown entity or relation", body = crate::error::ApiError),
        (status = 504, description = "Model timed out", body = crate::error::ApiError)
    )
)]
pub async fn kgc_handler(
    State(state): State<Arc<AppContext>>,
    payload: Result<Json<KgcRequest>, JsonRejection>,
) -> Result<Json<KgcResponse>, AppError> {
    let Json(req) = payload?;
    let query = req.query();

    let completion = run_blocking(&state, move |ctx| ctx.completer.complete(&query)).await?;
    let triple = completion.triple;

    Ok(Json(KgcResponse {
        code: CODE_SUCCESS,
        msg: "success".to_string(),
        head: triple.head,
        relation: triple.relation,
        tail: triple.tail,
    }))
}

/// Top-k prediction request
#[derive(Debug, Deserialize, ToSchema)]
pub struct PredictRequest {
    #[serde(default)]
    pub head: String,
    #[serde(default)]
    pub relation: String,
    #[serde(default)]
    pub tail: String,
    /// Candidates to return, defaults to `inference.default_top_k`
    #[schema(example = 5)]
    pub top_k: Option<usize>,
}

/// Ranked candidate label
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CandidateView {
    #[schema(example = "France")]
    pub label: String,
    pub score: f32,
}

impl From<Candidate> for CandidateView {
    fn from(candidate: Candidate) -> Self {
        Self {
            label: candidate.label,
            score: candidate.score,
        }
    }
}

/// Top-k candidates for the empty element
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PredictResponse {
    #[schema(example = 0)]
    pub code: i32,
    #[schema(example = "success")]
    pub msg: String,
    /// Element that was predicted: head, relation or tail
    #[schema(example = "tail")]
    pub target: String,
    pub candidates: Vec<CandidateView>,
}

/// Rank candidates for the single empty element of a triple
#[utoipa::path(
    post,
    path = "/kgc/predict",
    tag = "kgc",
    request_body = PredictRequest,
    responses(
        (status = 200, description = "Ranked candidates", body = PredictResponse),
        (status = 400, description = "Invalid query", body = crate::error::ApiError),
        (status = 404, description = "Unknown entity or relation", body = crate::error::ApiError)
    )
)]
pub async fn predict_handler(
    State(state): State<Arc<AppContext>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, AppError> {
    let Json(req) = payload?;

    let top_k = req.top_k.unwrap_or(state.config.inference.default_top_k);
    if top_k == 0 {
        return Err(AppError::BadRequest("top_k must be positive".to_string()));
    }

    let query = TripleQuery::from_labels(&req.head, &req.relation, &req.tail);
    let prediction = run_blocking(&state, move |ctx| ctx.completer.predict(&query, top_k)).await?;

    Ok(Json(PredictResponse {
        code: CODE_SUCCESS,
        msg: "success".to_string(),
        target: prediction.target.to_string(),
        candidates: prediction.candidates.into_iter().map(Into::into).collect(),
    }))
}

/// Tail-prediction benchmark over the testing split
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BenchmarkResponse {
    #[schema(example = 0)]
    pub code: i32,
    #[schema(example = "success")]
    pub msg: String,
    #[schema(example = 0.42)]
    pub hits_at_1: f64,
    #[schema(example = 0.55)]
    pub mrr: f64,
}

/// Evaluate tail prediction on the testing split
#[utoipa::path(
    get,
    path = "/kgc/benchmark",
    tag = "kgc",
    responses(
        (status = 200, description = "Hits@1 and MRR", body = BenchmarkResponse),
        (status = 500, description = "Evaluation failed", body = crate::error::ApiError),
        (status = 504, description = "Evaluation timed out", body = crate::error::ApiError)
    )
)]
pub async fn benchmark_handler(
    State(state): State<Arc<AppContext>>,
) -> Result<Json<BenchmarkResponse>, AppError> {
    // Model and split are immutable, so the first successful run is reused
    let (hits_at_1, mrr) = *state
        .benchmark
        .get_or_try_init(|| {
            run_blocking(&state, |ctx| {
                kgc_inference::benchmark(ctx.completer.predictor().as_ref(), &ctx.dataset.testing)
            })
        })
        .await?;

    Ok(Json(BenchmarkResponse {
        code: CODE_SUCCESS,
        msg: "success".to_string(),
        hits_at_1,
        mrr,
    }))
}
