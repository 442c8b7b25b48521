//! # Persistence
//!
//! Reports and prompts are stored behind two small traits so the analysis
//! pipeline and the handlers never depend on a particular database.
//!
//! ## Records:
//! - **Report**: created once at the end of an analysis, read by the listing and
//!   detail endpoints, deleted on request, never updated
//! - **Prompt**: a generated practice script, owned by the user who requested it
//!
//! ## Backends:
//! - **SqliteStore**: the server's store, a single database file
//! - **InMemoryStore**: used by tests and when no database path is configured

pub mod memory;
pub mod migrations;
pub mod sqlite;

use crate::analysis::types::{AdviceItem, HistoryRow, ScoredMetrics};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// A finished analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub owner_id: String,
    /// Prompt topic, or "Improvisation" for free speech
    pub title: String,
    pub audio_key: String,
    pub transcript: String,
    /// Target script the user read, when there was one
    pub prompt_text: Option<String>,
    pub metrics: ScoredMetrics,
    pub advice: Vec<AdviceItem>,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to create a report; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub owner_id: String,
    pub title: String,
    pub audio_key: String,
    pub transcript: String,
    pub prompt_text: Option<String>,
    pub metrics: ScoredMetrics,
    pub advice: Vec<AdviceItem>,
}

/// One page of a user's reports, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPage {
    pub reports: Vec<Report>,
    pub total: usize,
}

/// Practice summary across all of a user's reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_recordings: usize,
    /// Mean score, rounded to an integer
    pub average_score: f64,
    /// Estimated from transcript length at 2.5 characters per second, one decimal
    pub hours_practiced: f64,
    /// Score of the latest report minus score of the first
    pub improvement: f64,
}

/// Estimated speaking rate used to turn transcript length into practice time.
pub const CHARS_PER_SECOND: f64 = 2.5;

impl UserStats {
    /// Summarize reports given in chronological order. `None` when there are none.
    pub fn from_chronological(reports: &[&Report]) -> Option<Self> {
        let first = reports.first()?;
        let last = reports.last()?;

        let total = reports.len();
        let score_sum: f64 = reports.iter().map(|r| r.metrics.score).sum();
        let seconds: f64 = reports
            .iter()
            .map(|r| r.transcript.chars().count() as f64 / CHARS_PER_SECOND)
            .sum();

        Some(Self {
            total_recordings: total,
            average_score: (score_sum / total as f64).round(),
            hours_practiced: (seconds / 3600.0 * 10.0).round() / 10.0,
            improvement: last.metrics.score - first.metrics.score,
        })
    }
}

/// A generated practice script.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert(&self, report: NewReport) -> Result<Report>;

    /// The report, if it exists and belongs to `owner_id`.
    async fn find(&self, owner_id: &str, id: Uuid) -> Result<Option<Report>>;

    /// Page `page` (1-based) of `limit` reports, newest first.
    async fn list(&self, owner_id: &str, page: usize, limit: usize) -> Result<ReportPage>;

    /// Metrics and creation time of the `limit` newest reports, newest first.
    async fn recent_metrics(&self, owner_id: &str, limit: usize) -> Result<Vec<HistoryRow>>;

    /// Whether a report was deleted.
    async fn delete(&self, owner_id: &str, id: Uuid) -> Result<bool>;

    async fn stats(&self, owner_id: &str) -> Result<Option<UserStats>>;
}

#[async_trait]
pub trait PromptStore: Send + Sync {
    async fn insert_prompt(&self, owner_id: &str, title: &str, text: &str) -> Result<Prompt>;

    async fn find_prompt(&self, id: Uuid) -> Result<Option<Prompt>>;
}
