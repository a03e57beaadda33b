use axum::{http::StatusCode, response::IntoResponse};

use super::error_responses::AppError;

pub async fn not_found() -> impl IntoResponse {
    AppError::NotFound
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "All right, healthy!").into_response()
}
