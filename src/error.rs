//! # Error Handling
//!
//! Custom error types for the speech coach backend and their conversion to HTTP
//! responses.
//!
//! ## Error Categories:
//! - **ValidationError / BadRequest**: the client sent something unusable (400).
//!   Raised before any external call, so no side effects happen.
//! - **Unauthorized**: missing or unknown bearer token (401).
//! - **NotFound**: the prompt, report or recording does not exist or belongs to
//!   another user (404). Ownership is checked before any expensive work.
//! - **Upstream**: a model service or the blob store failed (502). The analysis
//!   is aborted and nothing is persisted.
//! - **Internal**: persistence or server-side failures (500). Configuration
//!   problems never get here: `AppConfig::load` fails at startup instead.
//!
//! ## JSON Response Format:
//! ```json
//! {
//!   "error": {
//!     "type": "not_found",
//!     "message": "Prompt not found",
//!     "timestamp": "2025-01-01T12:00:00Z"
//!   }
//! }
//! ```

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Every failure a request can end with.
#[derive(Debug)]
pub enum AppError {
    /// Persistence failures and other server-side problems
    Internal(String),

    /// Malformed request body or multipart payload
    BadRequest(String),

    /// Requested resource does not exist or is not owned by the caller
    NotFound(String),

    /// User input failed validation rules
    ValidationError(String),

    /// Missing or unrecognized credentials
    Unauthorized(String),

    /// An external collaborator (model service, blob store) failed
    Upstream(String),
}

impl AppError {
    /// Wrap a collaborator failure, naming the service that produced it.
    pub fn upstream(service: &str, err: anyhow::Error) -> Self {
        AppError::Upstream(format!("{} failed: {:#}", service, err))
    }

    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Upstream(msg) => write!(f, "Upstream service error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Maps each variant to a status code and the JSON error body shown above.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.parts().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = self.parts();

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

/// Untyped failures bubbling out of stores and helpers are server-side problems.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{:#}", err))
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::ValidationError("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Upstream("x".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_failures_are_internal() {
        let err: AppError = anyhow::anyhow!("disk full").context("saving report").into();
        assert!(matches!(err, AppError::Internal(ref msg) if msg == "saving report: disk full"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_upstream_names_service() {
        let err = AppError::upstream("transcription", anyhow::anyhow!("timeout"));
        assert_eq!(err.to_string(), "Upstream service error: transcription failed: timeout");
    }
}
