//! REST error mapping.
//!
//! | Error                      | Status | Code                   |
//! |----------------------------|--------|------------------------|
//! | malformed request          | 400    | `VALIDATION_ERROR`     |
//! | party not approved         | 403    | `NOT_APPROVED`         |
//! | unknown resource           | 404    | `NOT_FOUND`            |
//! | already decided            | 409    | `ALREADY_DECIDED`      |
//! | duplicate or lost race     | 409    | `CONFLICT`             |
//! | insufficient balance       | 422    | `INSUFFICIENT_BALANCE` |
//! | payment processor failure  | 502    | `PROCESSOR_ERROR`      |
//! | ledger or rate integrity   | 500    | `INTEGRITY_ERROR`      |

use crate::application::error::ApplicationError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors returned by REST handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be parsed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A use case failed.
    #[error(transparent)]
    Application(#[from] ApplicationError),
}

impl ApiError {
    /// Creates a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

/// Error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Stable machine-readable code.
    pub code: String,
    /// Current state of the resource, when the conflict resolves to it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<serde_json::Value>,
}

impl ApiError {
    fn classify(&self) -> (StatusCode, &'static str) {
        let Self::Application(e) = self else {
            return (StatusCode::BAD_REQUEST, "VALIDATION_ERROR");
        };
        if matches!(e, ApplicationError::AlreadyDecided(_)) {
            (StatusCode::CONFLICT, "ALREADY_DECIDED")
        } else if e.is_validation() {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
        } else if e.is_not_approved() {
            (StatusCode::FORBIDDEN, "NOT_APPROVED")
        } else if e.is_not_found() {
            (StatusCode::NOT_FOUND, "NOT_FOUND")
        } else if e.is_insufficient_balance() {
            (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_BALANCE")
        } else if e.is_conflict() {
            (StatusCode::CONFLICT, "CONFLICT")
        } else if e.is_processor() {
            (StatusCode::BAD_GATEWAY, "PROCESSOR_ERROR")
        } else if e.is_integrity() {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTEGRITY_ERROR")
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        if status.is_server_error() {
            error!(code, error = %self, "Request failed");
        }

        let current = match &self {
            Self::Application(ApplicationError::AlreadyDecided(party)) => {
                serde_json::to_value(party.as_ref()).ok()
            }
            _ => None,
        };
        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            current,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for REST handlers.
pub type ApiResult<T> = Result<T, ApiError>;
