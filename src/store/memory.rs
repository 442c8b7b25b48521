//! In-memory implementation of both stores.
//!
//! Reports are kept in insertion order, which is also creation order, behind a
//! `tokio::sync::RwLock`. Locks are only held for the duration of a single
//! read or write and never across an await on another service.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::analysis::types::{HistoryRow, StoredMetrics};
use crate::store::{NewReport, Prompt, PromptStore, Report, ReportPage, ReportStore, UserStats};
use anyhow::Result;

#[derive(Default)]
pub struct InMemoryStore {
    reports: RwLock<Vec<Report>>,
    prompts: RwLock<HashMap<Uuid, Prompt>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for InMemoryStore {
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

        self.reports.write().await.push(report.clone());
        Ok(report)
    }

    async fn find(&self, owner_id: &str, id: Uuid) -> Result<Option<Report>> {
        let reports = self.reports.read().await;
        Ok(reports
            .iter()
            .find(|r| r.id == id && r.owner_id == owner_id)
            .cloned())
    }

    async fn list(&self, owner_id: &str, page: usize, limit: usize) -> Result<ReportPage> {
        let reports = self.reports.read().await;
        let owned: Vec<&Report> = reports.iter().rev().filter(|r| r.owner_id == owner_id).collect();

        let skip = page.saturating_sub(1).saturating_mul(limit);
        Ok(ReportPage {
            total: owned.len(),
            reports: owned.into_iter().skip(skip).take(limit).cloned().collect(),
        })
    }

    async fn recent_metrics(&self, owner_id: &str, limit: usize) -> Result<Vec<HistoryRow>> {
        let reports = self.reports.read().await;
        Ok(reports
            .iter()
            .rev()
            .filter(|r| r.owner_id == owner_id)
            .take(limit)
            .map(|r| HistoryRow {
                created_at: r.created_at,
                metrics: Some(StoredMetrics::from(&r.metrics)),
            })
            .collect())
    }

    async fn delete(&self, owner_id: &str, id: Uuid) -> Result<bool> {
        let mut reports = self.reports.write().await;
        let before = reports.len();
        reports.retain(|r| !(r.id == id && r.owner_id == owner_id));
        Ok(reports.len() != before)
    }

    async fn stats(&self, owner_id: &str) -> Result<Option<UserStats>> {
        let reports = self.reports.read().await;
        let owned: Vec<&Report> = reports.iter().filter(|r| r.owner_id == owner_id).collect();
        Ok(UserStats::from_chronological(&owned))
    }
}

#[async_trait]
impl PromptStore for InMemoryStore {
    async fn insert_prompt(&self, owner_id: &str, title: &str, text: &str) -> Result<Prompt> {
        let prompt = Prompt {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };

        self.prompts.write().await.insert(prompt.id, prompt.clone());
        Ok(prompt)
    }

    async fn find_prompt(&self, id: Uuid) -> Result<Option<Prompt>> {
        Ok(self.prompts.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{Metrics, ScoredMetrics, Sentiment};

    fn new_report(owner: &str, score: f64, transcript: &str) -> NewReport {
        NewReport {
            owner_id: owner.to_string(),
            title: "Improvisation".to_string(),
            audio_key: format!("{}/clip.webm", owner),
            transcript: transcript.to_string(),
            prompt_text: None,
            metrics: ScoredMetrics {
                metrics: Metrics {
                    wpm: 130,
                    filler_rate: 0.0,
                    avg_pause_ms: 400.0,
                    word_error_rate: 0.0,
                    sentiment: Sentiment::Neutral,
                    improvisation: None,
                },
                long_pauses: 0,
                score,
            },
            advice: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_find_is_owner_scoped() {
        let store = InMemoryStore::new();
        let report = store.insert(new_report("alice", 80.0, "hi")).await.unwrap();

        assert!(store.find("alice", report.id).await.unwrap().is_some());
        assert!(store.find("bob", report.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_paginates_newest_first() {
        let store = InMemoryStore::new();
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
    async fn test_recent_metrics_limit() {
        let store = InMemoryStore::new();
        for score in [10.0, 20.0, 30.0] {
            store.insert(new_report("alice", score, "x")).await.unwrap();
        }

        let rows = store.recent_metrics("alice", 2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.metrics.is_some()));
        assert!(store.recent_metrics("carol", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_only_own_reports() {
        let store = InMemoryStore::new();
        let report = store.insert(new_report("alice", 80.0, "hi")).await.unwrap();

        assert!(!store.delete("bob", report.id).await.unwrap());
        assert!(store.delete("alice", report.id).await.unwrap());
        assert!(store.find("alice", report.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats() {
        let store = InMemoryStore::new();
        assert!(store.stats("alice").await.unwrap().is_none());

        // 9000 characters at 2.5 chars/s = 3600 s = 1 hour
        let long = "a".repeat(9000);
        store.insert(new_report("alice", 60.0, &long)).await.unwrap();
        store.insert(new_report("alice", 75.0, "")).await.unwrap();
        store.insert(new_report("alice", 91.0, "")).await.unwrap();

        let stats = store.stats("alice").await.unwrap().unwrap();
        assert_eq!(stats.total_recordings, 3);
        assert_eq!(stats.average_score, 75.0);
        assert_eq!(stats.hours_practiced, 1.0);
        assert_eq!(stats.improvement, 31.0);
    }

    #[tokio::test]
    async fn test_prompts_round_trip() {
        let store = InMemoryStore::new();
        let prompt = store.insert_prompt("alice", "random", "Some script").await.unwrap();

        let found = store.find_prompt(prompt.id).await.unwrap().unwrap();
        assert_eq!(found.owner_id, "alice");
        assert!(store.find_prompt(Uuid::new_v4()).await.unwrap().is_none());
    }
}
