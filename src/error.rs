use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::UnknownVariant;

/// Errors raised by the rate core (catalog, ledger, bulk operator).
#[derive(Debug, Error)]
pub enum RateError {
    /// Rate bounds or the default-template invariant were violated.
    #[error("Validation error: {0}")]
    Validation(String),
    /// A referenced affiliate, template or tier is absent.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The optimistic version check failed during a ledger write. Retryable.
    #[error("Concurrent modification: {0}")]
    Concurrency(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl RateError {
    /// Whether a caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RateError::Concurrency(_))
    }
}

impl From<UnknownVariant> for RateError {
    fn from(err: UnknownVariant) -> Self {
        RateError::NotFound(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<RateError> for AppError {
    fn from(err: RateError) -> Self {
        match err {
            RateError::Validation(msg) => AppError::BadRequest(msg),
            RateError::NotFound(msg) => AppError::NotFound(msg),
            RateError::Concurrency(msg) => AppError::Conflict(msg),
            RateError::Db(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
