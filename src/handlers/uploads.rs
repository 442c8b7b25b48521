//! Getting recordings into the blob store.
//!
//! Two ways in: ask for a presigned URL and PUT the bytes to it, or post the
//! file as multipart form data. Either way the key is
//! `<user id>/<unix millis>-<uuid><ext>`, and the analysis endpoint later checks
//! ownership against the `<user id>/` prefix.

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::handlers::ok;
use crate::services::blob::{owns_key, recording_key};
use crate::state::AppState;
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures_util::stream::StreamExt;
use serde_json::json;
use tracing::info;

const DEFAULT_EXTENSION: &str = ".webm";

/// POST /upload-url: reserve a key and return a presigned PUT URL for it.
pub async fn create_upload_url(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let key = recording_key(&user.id, DEFAULT_EXTENSION);
    let presigned = state
        .blobs
        .put_url(&key)
        .await
        .map_err(|e| AppError::upstream("presigning upload", e))?;

    Ok(ok(json!({
        "url": presigned.url,
        "key": key,
        "expiresAt": presigned.expires_at
    })))
}

/// PUT /blobs/{key}: raw upload target of a presigned URL.
pub async fn put_blob(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let key = path.into_inner();
    if !owns_key(&user.id, &key) {
        return Err(AppError::NotFound("Blob not found".to_string()));
    }
    if body.is_empty() {
        return Err(AppError::ValidationError("Audio file missing".to_string()));
    }

    state
        .blobs
        .write(&key, &body)
        .await
        .map_err(|e| AppError::upstream("blob upload", e))?;

    info!(owner = %user.id, key = %key, bytes = body.len(), "Stored recording");
    Ok(ok(json!({ "key": key })))
}

/// POST /uploads: multipart form with an `audio` file field.
///
/// ## Response:
/// ```json
/// {"success": true, "data": {"key": "user-1/1700000000000-6f1c...e2.webm", "bytes": 48213}}
/// ```
pub async fn upload_audio(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let max_bytes = state.config().storage.max_upload_bytes;
    let mut audio: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(item) = payload.next().await {
        let mut field: Field =
            item.map_err(|e| AppError::ValidationError(format!("Multipart error: {}", e)))?;

        let is_audio = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .map_or(false, |name| name == "audio");
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned);

        // Other fields still have to be drained before the next one can be read
        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::ValidationError(format!("Chunk error: {}", e)))?;
            if is_audio {
                if bytes.len() + chunk.len() > max_bytes {
                    return Err(AppError::ValidationError(format!(
                        "Audio file exceeds {} bytes",
                        max_bytes
                    )));
                }
                bytes.extend_from_slice(&chunk);
            }
        }

        if is_audio {
            audio = Some((filename, bytes));
        }
    }

    let (filename, bytes) = audio
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(|| AppError::ValidationError("Audio file missing".to_string()))?;

    let key = recording_key(&user.id, &extension_of(filename.as_deref()));
    state
        .blobs
        .write(&key, &bytes)
        .await
        .map_err(|e| AppError::upstream("blob upload", e))?;

    info!(owner = %user.id, key = %key, bytes = bytes.len(), "Stored uploaded recording");
    Ok(ok(json!({ "key": key, "bytes": bytes.len() })))
}

/// Extension of the uploaded file name, restricted to a short alphanumeric suffix.
fn extension_of(filename: Option<&str>) -> String {
    filename
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::orchestrator::tests::{harness, perfect_transcription, FakeModel};
    use crate::config::StorageConfig;
    use crate::handlers::tests::{api_app, bearer};
    use crate::services::blob::LocalBlobStore;
    use crate::services::BlobStore;
    use crate::state::tests::test_state;
    use actix_web::{http::StatusCode, test as actix_test};
    use std::sync::Arc;

    fn local_blobs(root: &std::path::Path) -> Arc<dyn BlobStore> {
        Arc::new(LocalBlobStore::new(&StorageConfig {
            blob_root: root.to_string_lossy().into_owned(),
            public_base_url: "http://localhost:4000/api/v1/blobs".to_string(),
            url_expiry_secs: 900,
            temp_dir: String::new(),
            max_upload_bytes: 64,
            database_path: String::new(),
        }))
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Some("take.WAV")), ".wav");
        assert_eq!(extension_of(Some("noext")), ".webm");
        assert_eq!(extension_of(Some("x.we/bm")), ".webm");
        assert_eq!(extension_of(None), ".webm");
    }

    #[actix_web::test]
    async fn test_upload_url_then_put() {
        let root = tempfile::tempdir().unwrap();
        let h = harness(perfect_transcription("hi"), FakeModel::new(), false, false);
        let app = api_app!(test_state(&h, local_blobs(root.path())));

        let req = actix_test::TestRequest::post()
            .uri("/api/v1/upload-url")
            .insert_header(bearer("token-alice"))
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        let key = body["data"]["key"].as_str().unwrap().to_string();
        assert!(key.starts_with("alice/") && key.ends_with(".webm"));
        assert!(body["data"]["url"].as_str().unwrap().ends_with(&key));

        // A second reservation in the same millisecond still gets its own key
        let req = actix_test::TestRequest::post()
            .uri("/api/v1/upload-url")
            .insert_header(bearer("token-alice"))
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        let other = body["data"]["key"].as_str().unwrap();
        assert_ne!(other, key);
        let name = other.strip_prefix("alice/").unwrap().strip_suffix(".webm").unwrap();
        let (millis, id) = name.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert!(uuid::Uuid::parse_str(id).is_ok());

        let req = actix_test::TestRequest::put()
            .uri(&format!("/api/v1/blobs/{}", key))
            .insert_header(bearer("token-alice"))
            .set_payload("audio-bytes")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(std::fs::read(root.path().join(&key)).unwrap(), b"audio-bytes");
    }

    #[actix_web::test]
    async fn test_put_rejects_foreign_key_and_missing_token() {
        let root = tempfile::tempdir().unwrap();
        let h = harness(perfect_transcription("hi"), FakeModel::new(), false, false);
        let app = api_app!(test_state(&h, local_blobs(root.path())));

        let req = actix_test::TestRequest::put()
            .uri("/api/v1/blobs/alice/clip.webm")
            .insert_header(bearer("token-bob"))
            .set_payload("x")
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = actix_test::TestRequest::put()
            .uri("/api/v1/blobs/alice/clip.webm")
            .set_payload("x")
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = actix_test::TestRequest::put()
            .uri("/api/v1/blobs/alice/clip.webm")
            .insert_header(bearer("token-alice"))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    fn multipart(field: &str, filename: &str, content: &str) -> (String, String) {
        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: audio/wav\r\n\r\n{content}\r\n--{b}--\r\n",
            b = boundary,
            field = field,
            filename = filename,
            content = content
        );
        (format!("multipart/form-data; boundary={}", boundary), body)
    }

    #[actix_web::test]
    async fn test_multipart_upload() {
        let root = tempfile::tempdir().unwrap();
        let h = harness(perfect_transcription("hi"), FakeModel::new(), false, false);
        let app = api_app!(test_state(&h, local_blobs(root.path())));

        let (content_type, body) = multipart("audio", "take.wav", "RIFFdata");
        let req = actix_test::TestRequest::post()
            .uri("/api/v1/uploads")
            .insert_header(bearer("token-alice"))
            .insert_header(("Content-Type", content_type))
            .set_payload(body)
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;

        let key = body["data"]["key"].as_str().unwrap();
        assert!(key.starts_with("alice/") && key.ends_with(".wav"));
        assert_eq!(std::fs::read(root.path().join(key)).unwrap(), b"RIFFdata");
    }

    #[actix_web::test]
    async fn test_multipart_without_audio_field() {
        let root = tempfile::tempdir().unwrap();
        let h = harness(perfect_transcription("hi"), FakeModel::new(), false, false);
        let app = api_app!(test_state(&h, local_blobs(root.path())));

        let (content_type, body) = multipart("other", "take.wav", "RIFFdata");
        let req = actix_test::TestRequest::post()
            .uri("/api/v1/uploads")
            .insert_header(bearer("token-alice"))
            .insert_header(("Content-Type", content_type))
            .set_payload(body)
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
