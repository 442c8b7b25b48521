use crate::analysis::AnalysisRequest;
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::handlers::{ok, parse_id};
use crate::state::AppState;
use crate::store::UserStats;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

const DEFAULT_PROMPT_TYPE: &str = "random";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptQuery {
    pub prompt_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordingRequest {
    #[serde(default)]
    pub audio_key: String,
    #[serde(default)]
    pub prompt_id: Option<String>,
}

/// GET /recordings/prompt: generate a practice script and keep it for the user.
pub async fn get_prompt(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    query: web::Query<PromptQuery>,
) -> Result<HttpResponse, AppError> {
    let max_chars = state.config().analysis.max_prompt_type_chars;
    let prompt_type = match query.into_inner().prompt_type {
        Some(raw) if raw.chars().count() > max_chars => {
            return Err(AppError::ValidationError(format!(
                "Prompt type must be at most {} characters",
                max_chars
            )));
        }
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => DEFAULT_PROMPT_TYPE.to_string(),
    };

    let text = state
        .prompt_generator
        .generate_prompt(&prompt_type)
        .await
        .map_err(|e| AppError::upstream("prompt generation", e))?;

    let prompt = state.prompts.insert_prompt(&user.id, &prompt_type, &text).await?;
    info!(owner = %user.id, prompt_id = %prompt.id, topic = %prompt_type, "Generated practice prompt");

    Ok(ok(json!({
        "promptId": prompt.id,
        "title": prompt.title,
        "text": prompt.text
    })))
}

/// POST /recordings: analyse an uploaded recording, optionally against a prompt.
pub async fn create_recording(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    body: web::Json<CreateRecordingRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();

    // An empty prompt id means improvisation, same as leaving it out
    let prompt_id = match body.prompt_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_id(raw, "Prompt")?),
        _ => None,
    };

    let guard = state.begin_analysis();
    let result = state
        .analyzer
        .analyse(AnalysisRequest {
            owner_id: user.id.clone(),
            audio_key: body.audio_key,
            prompt_id,
        })
        .await;

    match result {
        Ok(report_id) => {
            guard.succeed();
            Ok(ok(json!({ "reportId": report_id })))
        }
        Err(e) => {
            warn!(owner = %user.id, error = %e, "Recording analysis failed");
            Err(e)
        }
    }
}

/// GET /recordings/{id}
pub async fn get_recording(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path, "Report")?;
    let report = state
        .reports
        .find(&user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Report not found".to_string()))?;

    Ok(ok(report))
}

/// GET /recordings/stats: practice summary, all zeros before the first recording.
pub async fn get_user_stats(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let stats = state.reports.stats(&user.id).await?.unwrap_or_default();
    Ok(ok::<UserStats>(stats))
}
