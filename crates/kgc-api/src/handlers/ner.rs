//! Named entity recognition handler
//!
//! Author: hephaex@gmail.com

use crate::error::{AppError, CODE_SUCCESS};
use crate::handlers::run_blocking;
use crate::state::AppContext;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// NER request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct NerRequest {
    /// Text to annotate
    #[schema(example = "Send the report to ops@example.com by 2024-03-01.")]
    #[serde(default)]
    pub text: String,
}

/// NER response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NerResponse {
    #[schema(example = 0)]
    pub code: i32,
    #[schema(example = "success")]
    pub msg: String,
    /// Annotations serialized as a JSON array of
    /// `{text, entity_type, start, end, confidence}`
    pub text: String,
}

/// Tag entity spans in free text
#[utoipa::path(
    post,
    path = "/ner",
    tag = "ner",
    request_body = NerRequest,
    responses(
        (status = 200, description = "Annotations", body = NerResponse),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 504, description = "Recognizer timed out", body = crate::error::ApiError)
    )
)]
pub async fn ner_handler(
    State(state): State<Arc<AppContext>>,
    payload: Result<Json<NerRequest>, JsonRejection>,
) -> Result<Json<NerResponse>, AppError> {
    let Json(req) = payload?;

    let annotations = run_blocking(&state, move |ctx| ctx.ner.annotate(&req.text)).await?;

    Ok(Json(NerResponse {
        code: CODE_SUCCESS,
        msg: "success".to_string(),
        text: annotations,
    }))
}
