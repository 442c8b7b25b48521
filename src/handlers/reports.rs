use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::handlers::{ok, ok_with_meta, parse_id};
use crate::services::PresignedUrl;
use crate::state::AppState;
use crate::store::Report;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

const DEFAULT_PAGE: usize = 1;
const DEFAULT_LIMIT: usize = 3;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PageMeta {
    pub page: usize,
    pub limit: usize,
    pub pages: usize,
    pub total: usize,
}

impl PageMeta {
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        Self {
            page,
            limit,
            pages: (total + limit - 1) / limit,
            total,
        }
    }
}

/// A report together with a short-lived link to its audio.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetail {
    #[serde(flatten)]
    pub report: Report,
    pub audio_url: PresignedUrl,
}

/// GET /reports?page=&limit=: newest first.
pub async fn list_reports(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let page = query.page.unwrap_or(DEFAULT_PAGE);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if page == 0 || limit == 0 || limit > MAX_LIMIT {
        return Err(AppError::ValidationError(format!(
            "page must be at least 1 and limit between 1 and {}",
            MAX_LIMIT
        )));
    }

    let result = state.reports.list(&user.id, page, limit).await?;
    Ok(ok_with_meta(result.reports, PageMeta::new(page, limit, result.total)))
}

/// GET /reports/{id}
pub async fn get_report(
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

    let audio_url = state
        .blobs
        .get_url(&report.audio_key)
        .await
        .map_err(|e| AppError::upstream("presigning download", e))?;

    Ok(ok(ReportDetail { report, audio_url }))
}

/// DELETE /reports/{id}
pub async fn delete_report(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path, "Report")?;
    if !state.reports.delete(&user.id, id).await? {
        return Err(AppError::NotFound("Report not found".to_string()));
    }

    info!(owner = %user.id, report_id = %id, "Deleted report");
    Ok(HttpResponse::NoContent().finish())
}
