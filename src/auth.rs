//! # Authentication
//!
//! Every `/api/v1` route except health and metrics requires a bearer token.
//! Tokens are mapped to user ids in configuration (`[[auth.users]]`); the user
//! id is what owns reports, prompts and blob keys.
//!
//! Handlers ask for it by taking an [`AuthenticatedUser`] argument:
//! ```ignore
//! pub async fn list_reports(user: AuthenticatedUser, ...) -> Result<HttpResponse, AppError>
//! ```

use crate::error::AppError;
use crate::state::AppState;
use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use std::future::{ready, Ready};

/// The caller, as resolved from the `Authorization: Bearer <token>` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
}

impl AuthenticatedUser {
    fn from_request_parts(req: &HttpRequest) -> Result<Self, AppError> {
        let state = req
            .app_data::<web::Data<AppState>>()
            .ok_or_else(|| AppError::Internal("Application state not configured".to_string()))?;

        let token = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

        match state.config().auth.user_for_token(token) {
            Some(user_id) => Ok(Self { id: user_id.to_string() }),
            None => {
                tracing::debug!(path = %req.path(), "Rejected unknown bearer token");
                Err(AppError::Unauthorized("Invalid bearer token".to_string()))
            }
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::from_request_parts(req))
    }
}
