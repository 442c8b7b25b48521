//! Value types shared by the analysis pipeline.
//!
//! Everything that crosses a service boundary is parsed into one of these
//! types first; nothing downstream works on raw JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Overall tone of a transcript as judged by the sentiment service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl FromStr for Sentiment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            other => Err(anyhow::anyhow!("Unknown sentiment label '{}'", other)),
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        };
        f.write_str(label)
    }
}

/// One spoken interval of the transcript timeline, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineInterval {
    pub start: f64,
    pub end: f64,
}

impl TimelineInterval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// Output of the transcription gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub text: String,
    pub duration_seconds: f64,
    /// Word-level intervals when available, otherwise segment-level.
    pub timeline: Vec<TimelineInterval>,
}

/// Content-quality sub-scores for improvised speech, each 0 (worst) to 10 (best).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImprovisationScores {
    pub clarity: u8,
    pub engagement: u8,
    pub conciseness: u8,
}

impl ImprovisationScores {
    pub const MAX: u8 = 10;

    /// Reject anything outside 0..=10 instead of silently clamping it.
    pub fn validate(self) -> anyhow::Result<Self> {
        for (axis, value) in [
            ("clarity", self.clarity),
            ("engagement", self.engagement),
            ("conciseness", self.conciseness),
        ] {
            if value > Self::MAX {
                anyhow::bail!("{} score {} is outside 0-{}", axis, value, Self::MAX);
            }
        }
        Ok(self)
    }
}

/// Objective and model-derived metrics of one recording, before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub wpm: u32,
    pub filler_rate: f64,
    pub avg_pause_ms: f64,
    /// Always 0 when the recording had no target script.
    pub word_error_rate: f64,
    pub sentiment: Sentiment,
    #[serde(flatten)]
    pub improvisation: Option<ImprovisationScores>,
}

/// Metrics plus the values appended by the scoring engine. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredMetrics {
    #[serde(flatten)]
    pub metrics: Metrics,
    pub long_pauses: u32,
    pub score: f64,
}

/// Label of an advice item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceLabel {
    Positive,
    Improvement,
}

impl AdviceLabel {
    /// Only the two exact lowercase labels are accepted.
    pub fn parse_exact(label: &str) -> Option<Self> {
        match label {
            "positive" => Some(AdviceLabel::Positive),
            "improvement" => Some(AdviceLabel::Improvement),
            _ => None,
        }
    }
}

/// A single piece of feedback stored on a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceItem {
    pub text: String,
    #[serde(rename = "type")]
    pub label: AdviceLabel,
}

impl AdviceItem {
    pub fn new(text: impl Into<String>, label: AdviceLabel) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// Untrusted advice suggestion as returned by the language model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdviceCandidate {
    pub text: Option<String>,
    pub label: Option<String>,
}

impl AdviceCandidate {
    /// Pull `text` and `type` out of an arbitrary JSON value. Wrong types read as absent.
    pub fn from_value(value: &serde_json::Value) -> Self {
        Self {
            text: value.get("text").and_then(|v| v.as_str()).map(str::to_owned),
            label: value.get("type").and_then(|v| v.as_str()).map(str::to_owned),
        }
    }
}

/// Metrics of a past report as they come out of storage. Older records may lack any field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredMetrics {
    pub wpm: Option<u32>,
    pub filler_rate: Option<f64>,
    pub avg_pause_ms: Option<f64>,
    pub word_error_rate: Option<f64>,
    pub sentiment: Option<Sentiment>,
    pub clarity: Option<u8>,
    pub engagement: Option<u8>,
    pub conciseness: Option<u8>,
}

impl From<&ScoredMetrics> for StoredMetrics {
    fn from(scored: &ScoredMetrics) -> Self {
        let m = &scored.metrics;
        Self {
            wpm: Some(m.wpm),
            filler_rate: Some(m.filler_rate),
            avg_pause_ms: Some(m.avg_pause_ms),
            word_error_rate: Some(m.word_error_rate),
            sentiment: Some(m.sentiment),
            clarity: m.improvisation.map(|s| s.clarity),
            engagement: m.improvisation.map(|s| s.engagement),
            conciseness: m.improvisation.map(|s| s.conciseness),
        }
    }
}

/// Projection of a stored report used to build history context.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub created_at: DateTime<Utc>,
    pub metrics: Option<StoredMetrics>,
}

/// Fully populated metrics of a past session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMetrics {
    pub wpm: u32,
    pub filler_rate: f64,
    pub avg_pause_ms: f64,
    pub word_error_rate: f64,
    pub sentiment: Sentiment,
    pub clarity: u8,
    pub engagement: u8,
    pub conciseness: u8,
}

/// A past session handed to the advice generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub created_at: DateTime<Utc>,
    pub metrics: HistoryMetrics,
}
