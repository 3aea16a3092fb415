//! Application error type mapping to HTTP status codes and the envelope
//! body format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use samovar_types::error::EngineError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Requested entity does not exist.
    NotFound(String),
    /// Request was well-formed JSON but semantically invalid.
    Validation(String),
    /// Anything unexpected.
    Internal(String),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            AppError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };

        let body = json!({
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (status, axum::Json(body)).into_response()
    }
}
