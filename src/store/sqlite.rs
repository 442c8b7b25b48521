//! SQLite implementation of both stores.
//!
//! One connection behind a mutex; every call runs on tokio's blocking pool so
//! disk I/O never stalls the request workers. Timestamps are fixed-width
//! RFC 3339 strings, so ordering by the column is chronological, and `rowid`
//! breaks ties in insertion order.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::migrations;
use crate::analysis::types::{AdviceItem, HistoryRow, ScoredMetrics, StoredMetrics};
use crate::store::{NewReport, Prompt, PromptStore, Report, ReportPage, ReportStore, UserStats};

const REPORT_COLUMNS: &str =
    "id, owner_id, title, audio_key, transcript, prompt_text, metrics, advice, created_at";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file and apply pending migrations.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        migrations::run_migrations(&conn).context("Failed to run database migrations")?;

        tracing::info!(path = %db_path.display(), "Database initialized");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| anyhow!("Failed to lock database connection: {}", e))?;
            f(&conn)
        })
        .await
        .context("Database task panicked")?
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Bad timestamp '{}'", raw))?
        .with_timezone(&Utc))
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Bad id '{}'", raw))
}

/// Raw columns of a `reports` row; decoded outside the rusqlite callback.
struct ReportRow {
    id: String,
    owner_id: String,
    title: String,
    audio_key: String,
    transcript: String,
    prompt_text: Option<String>,
    metrics: String,
    advice: String,
    created_at: String,
}

impl ReportRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            title: row.get(2)?,
            audio_key: row.get(3)?,
            transcript: row.get(4)?,
            prompt_text: row.get(5)?,
            metrics: row.get(6)?,
            advice: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn decode(self) -> Result<Report> {
        let metrics: ScoredMetrics = serde_json::from_str(&self.metrics)
            .with_context(|| format!("Report {} has unreadable metrics", self.id))?;
        let advice: Vec<AdviceItem> = serde_json::from_str(&self.advice)
            .with_context(|| format!("Report {} has unreadable advice", self.id))?;

        Ok(Report {
            id: parse_uuid(&self.id)?,
            owner_id: self.owner_id,
            title: self.title,
            audio_key: self.audio_key,
            transcript: self.transcript,
            prompt_text: self.prompt_text,
            metrics,
            advice,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn query_reports(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Report>> {
    let mut stmt = conn.prepare(sql).context("Failed to prepare report query")?;
    let rows = stmt
        .query_map(params, ReportRow::from_row)
        .context("Failed to query reports")?;

    let mut reports = Vec::new();
    for row in rows {
        reports.push(row.context("Failed to read report row")?.decode()?);
    }
    Ok(reports)
}

#[async_trait]
impl ReportStore for SqliteStore {
    async fn insert(&self, report: NewReport) -> Result<Report> {
        let report = Report {
            id: Uuid::new_v4(),
            owner_id: report.owner_id,
            title: report.title,
            audio_key: report.audio_key,
            transcript: report.transcript,
            prompt_text: report.prompt_text,
            metrics: report.metrics,
            advice: report.advice,
            created_at: Utc::now(),
        };
        let metrics = serde_json::to_string(&report.metrics).context("Failed to encode metrics")?;
        let advice = serde_json::to_string(&report.advice).context("Failed to encode advice")?;

        let stored = report.clone();
        self.with_connection(move |conn| {
            conn.execute(
                r#"
                INSERT INTO reports (
                    id, owner_id, title, audio_key, transcript, prompt_text,
                    metrics, score, advice, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    stored.id.to_string(),
                    stored.owner_id,
                    stored.title,
                    stored.audio_key,
                    stored.transcript,
                    stored.prompt_text,
                    metrics,
                    stored.metrics.score,
                    advice,
                    timestamp(stored.created_at),
                ],
            )
            .context("Failed to insert report")?;
            Ok(())
        })
        .await?;

        Ok(report)
    }

    async fn find(&self, owner_id: &str, id: Uuid) -> Result<Option<Report>> {
        let owner_id = owner_id.to_string();
        self.with_connection(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM reports WHERE id = ?1 AND owner_id = ?2", REPORT_COLUMNS),
                    params![id.to_string(), owner_id],
                    ReportRow::from_row,
                )
                .optional()
                .context("Failed to get report")?;
            row.map(ReportRow::decode).transpose()
        })
        .await
    }

    async fn list(&self, owner_id: &str, page: usize, limit: usize) -> Result<ReportPage> {
        let owner_id = owner_id.to_string();
        let offset = page.saturating_sub(1).saturating_mul(limit);
        self.with_connection(move |conn| {
            let total: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM reports WHERE owner_id = ?1",
                    params![owner_id],
                    |row| row.get(0),
                )
                .context("Failed to count reports")?;

            let reports = query_reports(
                conn,
                &format!(
                    "SELECT {} FROM reports WHERE owner_id = ?1 \
                     ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
                    REPORT_COLUMNS
                ),
                params![owner_id, limit as i64, offset as i64],
            )?;

            Ok(ReportPage {
                reports,
                total: total as usize,
            })
        })
        .await
    }

    async fn recent_metrics(&self, owner_id: &str, limit: usize) -> Result<Vec<HistoryRow>> {
        let owner_id = owner_id.to_string();
        self.with_connection(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT created_at, metrics FROM reports WHERE owner_id = ?1 \
                     ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                )
                .context("Failed to prepare history query")?;
            let rows = stmt
                .query_map(params![owner_id, limit as i64], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
                })
                .context("Failed to query history")?;

            let mut history = Vec::new();
            for row in rows {
                let (created_at, metrics) = row.context("Failed to read history row")?;
                history.push(HistoryRow {
                    created_at: parse_timestamp(&created_at)?,
                    // Unreadable metrics count as missing; history fills in defaults
                    metrics: metrics.and_then(|raw| serde_json::from_str::<StoredMetrics>(&raw).ok()),
                });
            }
            Ok(history)
        })
        .await
    }

    async fn delete(&self, owner_id: &str, id: Uuid) -> Result<bool> {
        let owner_id = owner_id.to_string();
        self.with_connection(move |conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM reports WHERE id = ?1 AND owner_id = ?2",
                    params![id.to_string(), owner_id],
                )
                .context("Failed to delete report")?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn stats(&self, owner_id: &str) -> Result<Option<UserStats>> {
        let owner_id = owner_id.to_string();
        let reports = self
            .with_connection(move |conn| {
                query_reports(
                    conn,
                    &format!(
                        "SELECT {} FROM reports WHERE owner_id = ?1 ORDER BY created_at ASC, rowid ASC",
                        REPORT_COLUMNS
                    ),
                    params![owner_id],
                )
            })
            .await?;

        let chronological: Vec<&Report> = reports.iter().collect();
        Ok(UserStats::from_chronological(&chronological))
    }
}

#[async_trait]
impl PromptStore for SqliteStore {
    async fn insert_prompt(&self, owner_id: &str, title: &str, text: &str) -> Result<Prompt> {
        let prompt = Prompt {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };

        let stored = prompt.clone();
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO prompts (id, owner_id, title, text, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    stored.id.to_string(),
                    stored.owner_id,
                    stored.title,
                    stored.text,
                    timestamp(stored.created_at),
                ],
            )
            .context("Failed to insert prompt")?;
            Ok(())
        })
        .await?;

        Ok(prompt)
    }

    async fn find_prompt(&self, id: Uuid) -> Result<Option<Prompt>> {
        self.with_connection(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, owner_id, title, text, created_at FROM prompts WHERE id = ?1",
                    params![id.to_string()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    },
                )
                .optional()
                .context("Failed to get prompt")?;

            row.map(|(id, owner_id, title, text, created_at)| {
                Ok(Prompt {
                    id: parse_uuid(&id)?,
                    owner_id,
                    title,
                    text,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .transpose()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{
        AdviceLabel, ImprovisationScores, Metrics, ScoredMetrics, Sentiment,
    };

    fn new_report(owner: &str, score: f64, transcript: &str) -> NewReport {
        NewReport {
            owner_id: owner.to_string(),
            title: "Improvisation".to_string(),
            audio_key: format!("{}/1700000000000-clip.webm", owner),
            transcript: transcript.to_string(),
            prompt_text: None,
            metrics: ScoredMetrics {
                metrics: Metrics {
                    wpm: 128,
                    filler_rate: 2.5,
                    avg_pause_ms: 420.0,
                    word_error_rate: 0.0,
                    sentiment: Sentiment::Positive,
                    improvisation: Some(ImprovisationScores { clarity: 7, engagement: 8, conciseness: 6 }),
                },
                long_pauses: 1,
                score,
            },
            advice: vec![
                AdviceItem::new("Good pace", AdviceLabel::Positive),
                AdviceItem::new("Fewer fillers", AdviceLabel::Improvement),
            ],
        }
    }

    fn db_file(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("data").join("speech.db")
    }

    fn open(dir: &tempfile::TempDir) -> SqliteStore {
        SqliteStore::open(db_file(dir)).unwrap()
    }

    #[tokio::test]
    async fn test_reports_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (report, prompt) = {
            let store = open(&dir);
            let prompt = store.insert_prompt("alice", "Leadership", "Lead by example.").await.unwrap();
            let mut new = new_report("alice", 82.5, "hello there");
            new.prompt_text = Some("Lead by example.".to_string());
            (store.insert(new).await.unwrap(), prompt)
        };

        assert!(db_file(&dir).exists());
        let store = open(&dir);

        let found = store.find("alice", report.id).await.unwrap().unwrap();
        assert_eq!(found.id, report.id);
        assert_eq!(found.metrics, report.metrics);
        assert_eq!(found.advice, report.advice);
        assert_eq!(found.prompt_text.as_deref(), Some("Lead by example."));
        assert_eq!(found.created_at, report.created_at);

        let found = store.find_prompt(prompt.id).await.unwrap().unwrap();
        assert_eq!(found, prompt);
    }

    #[tokio::test]
    async fn test_owner_scoping_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        let report = store.insert(new_report("alice", 80.0, "hi")).await.unwrap();

        assert!(store.find("bob", report.id).await.unwrap().is_none());
        assert!(!store.delete("bob", report.id).await.unwrap());
        assert!(store.delete("alice", report.id).await.unwrap());
        assert!(store.find("alice", report.id).await.unwrap().is_none());
        assert!(store.find_prompt(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_paginates_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        for score in [10.0, 20.0, 30.0, 40.0, 50.0] {
            store.insert(new_report("alice", score, "x")).await.unwrap();
        }
        store.insert(new_report("bob", 99.0, "x")).await.unwrap();

        let first = store.list("alice", 1, 3).await.unwrap();
        assert_eq!(first.total, 5);
        let scores: Vec<f64> = first.reports.iter().map(|r| r.metrics.score).collect();
        assert_eq!(scores, vec![50.0, 40.0, 30.0]);

        let second = store.list("alice", 2, 3).await.unwrap();
        let scores: Vec<f64> = second.reports.iter().map(|r| r.metrics.score).collect();
        assert_eq!(scores, vec![20.0, 10.0]);
        assert!(store.list("alice", 3, 3).await.unwrap().reports.is_empty());
    }

    #[tokio::test]
    async fn test_recent_metrics_tolerates_old_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        store.insert(new_report("alice", 70.0, "x")).await.unwrap();

        // A row written before sub-scores existed, and one with garbage metrics
        store
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO reports (id, owner_id, title, audio_key, transcript, metrics, score, advice, created_at) \
                     VALUES (?1, 'alice', 't', 'alice/a', '', '{\"wpm\":120}', 50, '[]', '2020-01-01T00:00:00.000000000Z'), \
                            (?2, 'alice', 't', 'alice/b', '', 'not json', 40, '[]', '2019-01-01T00:00:00.000000000Z')",
                    params![Uuid::new_v4().to_string(), Uuid::new_v4().to_string()],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let rows = store.recent_metrics("alice", 5).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].created_at > rows[1].created_at);

        let newest = rows[0].metrics.as_ref().unwrap();
        assert_eq!(newest.wpm, Some(128));
        assert_eq!(newest.clarity, Some(7));

        let legacy = rows[1].metrics.as_ref().unwrap();
        assert_eq!(legacy.wpm, Some(120));
        assert_eq!(legacy.sentiment, None);
        assert_eq!(rows[2].metrics, None);

        assert_eq!(store.recent_metrics("alice", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stats_in_chronological_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        assert!(store.stats("alice").await.unwrap().is_none());

        // 9000 characters at 2.5 chars/s = 1 hour
        store.insert(new_report("alice", 60.0, &"a".repeat(9000))).await.unwrap();
        store.insert(new_report("alice", 75.0, "")).await.unwrap();
        store.insert(new_report("alice", 91.0, "")).await.unwrap();

        let stats = store.stats("alice").await.unwrap().unwrap();
        assert_eq!(stats.total_recordings, 3);
        assert_eq!(stats.average_score, 75.0);
        assert_eq!(stats.hours_practiced, 1.0);
        assert_eq!(stats.improvement, 31.0);
    }
}
