//! # HTTP Handlers
//!
//! All authenticated routes live under `/api/v1` and answer with the envelope
//! `{"success": true, "data": ..., "meta"?: ...}`. Failures go through
//! [`AppError`], which renders its own error body.
//!
//! ## Route Table:
//! | method | path | handler |
//! |---|---|---|
//! | POST | `/upload-url` | [`uploads::create_upload_url`] |
//! | PUT | `/blobs/{key}` | [`uploads::put_blob`] |
//! | POST | `/uploads` | [`uploads::upload_audio`] |
//! | GET | `/recordings/prompt` | [`recordings::get_prompt`] |
//! | GET | `/recordings/stats` | [`recordings::get_user_stats`] |
//! | POST | `/recordings` | [`recordings::create_recording`] |
//! | GET | `/recordings/{id}` | [`recordings::get_recording`] |
//! | GET | `/reports` | [`reports::list_reports`] |
//! | GET | `/reports/{id}` | [`reports::get_report`] |
//! | DELETE | `/reports/{id}` | [`reports::delete_report`] |

pub mod recordings;
pub mod reports;
pub mod uploads;

use crate::error::AppError;
use actix_web::{web, HttpResponse};
use serde::Serialize;
use uuid::Uuid;

/// Success body shared by every handler.
#[derive(Debug, Serialize)]
pub struct Envelope<T, M = ()> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<M>,
}

pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(Envelope::<T, ()> {
        success: true,
        data,
        meta: None,
    })
}

pub fn ok_with_meta<T: Serialize, M: Serialize>(data: T, meta: M) -> HttpResponse {
    HttpResponse::Ok().json(Envelope {
        success: true,
        data,
        meta: Some(meta),
    })
}

/// Parse a path id; anything that is not a UUID cannot name an existing record.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::NotFound(format!("{} not found", what)))
}

/// Register every authenticated route. Specific `/recordings/*` paths come
/// before `/recordings/{id}` so they are not captured as ids.
pub fn configure_api_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/upload-url", web::post().to(uploads::create_upload_url))
        .route("/blobs/{key:.*}", web::put().to(uploads::put_blob))
        .route("/uploads", web::post().to(uploads::upload_audio))
        .route("/recordings/prompt", web::get().to(recordings::get_prompt))
        .route("/recordings/stats", web::get().to(recordings::get_user_stats))
        .route("/recordings", web::post().to(recordings::create_recording))
        .route("/recordings/{id}", web::get().to(recordings::get_recording))
        .route("/reports", web::get().to(reports::list_reports))
        .route("/reports/{id}", web::get().to(reports::get_report))
        .route("/reports/{id}", web::delete().to(reports::delete_report));
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Initialise the full authenticated route table over a state, under `/api/v1`.
    macro_rules! api_app {
        ($state:expr) => {
            actix_web::test::init_service(
                actix_web::App::new()
                    .app_data(actix_web::web::Data::new($state))
                    .service(
                        actix_web::web::scope("/api/v1")
                            .configure(crate::handlers::configure_api_routes),
                    ),
            )
            .await
        };
    }
    pub(crate) use api_app;

    pub fn bearer(token: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", token))
    }

    #[test]
    fn test_envelope_omits_missing_meta() {
        let body = serde_json::to_value(Envelope::<_, ()> {
            success: true,
            data: 5,
            meta: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "data": 5}));
    }

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "Report").unwrap(), id);
        assert!(matches!(parse_id("nope", "Report"), Err(AppError::NotFound(_))));
    }
}
