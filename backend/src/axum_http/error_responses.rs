use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Extra top-level fields some clients rely on, e.g. `redirectToPortal`.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Map<String, Value>>,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            extra: None,
        }
    }
}

/// Implemented by every use-case error so handlers can render it uniformly.
pub trait ApiError: std::fmt::Display {
    fn status_code(&self) -> StatusCode;

    /// Stable machine-readable code, e.g. `INSUFFICIENT_CREDITS`.
    fn code(&self) -> &'static str;

    fn extra(&self) -> Option<Map<String, Value>> {
        None
    }
}

pub fn error_response<E: ApiError>(err: &E) -> Response {
    let body = ErrorResponse {
        error: err.code().to_string(),
        message: err.to_string(),
        extra: err.extra(),
    };

    (err.status_code(), Json(body)).into_response()
}

// Errors raised by the HTTP layer itself rather than a use case.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Route not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "NOT_FOUND",
            AppError::BadRequest(_) => "VALIDATION_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error_response(&self)
    }
}

// Extractor rejections, paired with `axum_extra::extract::WithRejection`.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
