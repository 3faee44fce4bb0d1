//! API error handling
//!
//! Every failure becomes a JSON body `{code: -1, msg}`, never a bare status.
//!
//! Author: hephaex@gmail.com

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kgc_core::KgcError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `code` value of a successful response
pub const CODE_SUCCESS: i32 = 0;

/// `code` value of every failed response
pub const CODE_ERROR: i32 = -1;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Always -1
    pub code: i32,
    /// Human-readable message
    #[schema(example = "exactly one of head, relation, tail must be empty")]
    pub msg: String,
}

impl ApiError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            code: CODE_ERROR,
            msg: msg.into(),
        }
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    MethodNotAllowed(String),
    Timeout(u64),
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::MethodNotAllowed(msg)
            | AppError::Internal(msg) => msg.clone(),
            AppError::Timeout(secs) => format!("Model call timed out after {secs}s"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.message(), "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self.message(), "Request rejected");
        }

        (status, Json(ApiError::new(self.message()))).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<KgcError> for AppError {
    fn from(err: KgcError) -> Self {
        match err {
            KgcError::InvalidQuery(_) => AppError::BadRequest(err.to_string()),
            KgcError::UnknownEntity(_) | KgcError::UnknownRelation(_) => {
                AppError::NotFound(err.to_string())
            }
            KgcError::TargetNotFound { .. }
            | KgcError::NoCandidates(_)
            | KgcError::MalformedLine { .. }
            | KgcError::ModelLoad(_)
            | KgcError::Recognition(_)
            | KgcError::Io { .. }
            | KgcError::ConfigError(_)
            | KgcError::Other(_) => AppError::Internal(err.to_string()),
        }
    }
}
