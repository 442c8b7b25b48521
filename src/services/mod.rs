//! # External Services
//!
//! Interfaces for every collaborator the analysis pipeline talks to, plus the
//! concrete implementations the server runs with.
//!
//! ## Key Components:
//! - **BlobStore**: where uploaded recordings live ([`blob::LocalBlobStore`])
//! - **TranscriptionService**: audio file → transcript + timeline
//! - **SentimentService**: transcript → positive / neutral / negative
//! - **AdviceGenerator**: metrics + history → untrusted advice candidates
//! - **ImprovisationScorer**: transcript → clarity / engagement / conciseness
//! - **PromptGenerator**: topic → a ~140-word practice script
//!
//! The five model-backed services are implemented by [`openai::OpenAiClient`].
//! All traits are object safe so the orchestrator can hold them as
//! `Arc<dyn Trait>` and tests can swap in fakes.

pub mod blob;
pub mod openai;

use crate::analysis::types::{
    AdviceCandidate, HistoryEntry, ImprovisationScores, Metrics, Sentiment, Transcription,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// A time-limited URL for uploading or downloading one blob.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// URL a client can PUT the recording to.
    async fn put_url(&self, key: &str) -> Result<PresignedUrl>;

    /// URL a client can GET the recording from.
    async fn get_url(&self, key: &str) -> Result<PresignedUrl>;

    /// Store raw bytes under `key`, replacing any previous content.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Copy the blob stored under `key` to a local file.
    async fn fetch_to_local(&self, key: &str, destination: &Path) -> Result<()>;
}

#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcription>;
}

#[async_trait]
pub trait SentimentService: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Sentiment>;
}

#[async_trait]
pub trait AdviceGenerator: Send + Sync {
    /// `history` is ordered oldest first. The result is not trusted and must go
    /// through [`crate::analysis::advice::normalize_advice`].
    async fn generate(
        &self,
        metrics: &Metrics,
        history: &[HistoryEntry],
    ) -> Result<Vec<AdviceCandidate>>;
}

#[async_trait]
pub trait ImprovisationScorer: Send + Sync {
    async fn score_improvisation(&self, text: &str) -> Result<ImprovisationScores>;
}

#[async_trait]
pub trait PromptGenerator: Send + Sync {
    /// Always yields a non-empty script, whatever the topic.
    async fn generate_prompt(&self, topic: &str) -> Result<String>;
}
