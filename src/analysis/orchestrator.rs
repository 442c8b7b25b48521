//! # Analysis Orchestrator
//!
//! Runs one recording through the whole pipeline and persists the report.
//!
//! ## Sequence:
//! 1. Resolve the target prompt (ownership checked before any cost is incurred)
//! 2. Download the audio to a uniquely named temp file and transcribe it
//! 3. Remove the temp file, whatever happened
//! 4. Objective metrics: tempo, fillers, pauses, word error rate
//! 5. Sentiment, plus content sub-scores for improvised speech
//! 6. Composite score
//! 7. History context and advice generation
//! 8. Advice normalization and persistence
//!
//! Any failing step aborts the run; a report is only written at the very end,
//! so there is never a partial report.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::advice::normalize_advice;
use crate::analysis::history::recent_history;
use crate::analysis::scoring::score_metrics;
use crate::analysis::text_metrics::{
    filler_rate, gap_statistics, word_error_rate, words_per_minute, GapStatistics,
};
use crate::analysis::types::{Metrics, Transcription};
use crate::error::{AppError, AppResult};
use crate::services::blob::owns_key;
use crate::services::{
    AdviceGenerator, BlobStore, ImprovisationScorer, SentimentService, TranscriptionService,
};
use crate::store::{NewReport, Prompt, PromptStore, ReportStore};

/// Title of reports recorded without a target script.
pub const IMPROVISATION_TITLE: &str = "Improvisation";

/// Collaborators the orchestrator depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub blobs: Arc<dyn BlobStore>,
    pub transcriber: Arc<dyn TranscriptionService>,
    pub sentiment: Arc<dyn SentimentService>,
    pub advisor: Arc<dyn AdviceGenerator>,
    pub improvisation: Arc<dyn ImprovisationScorer>,
    pub reports: Arc<dyn ReportStore>,
    pub prompts: Arc<dyn PromptStore>,
}

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub history_limit: usize,
    pub min_gap_seconds: f64,
    pub temp_dir: PathBuf,
}

/// One submitted recording.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub owner_id: String,
    pub audio_key: String,
    pub prompt_id: Option<Uuid>,
}

pub struct Analyzer {
    services: Collaborators,
    settings: AnalysisSettings,
}

impl Analyzer {
    pub fn new(services: Collaborators, settings: AnalysisSettings) -> Self {
        Self { services, settings }
    }

    /// Analyse a recording and return the id of the stored report.
    pub async fn analyse(&self, request: AnalysisRequest) -> AppResult<Uuid> {
        let started = Instant::now();

        if request.audio_key.trim().is_empty() {
            return Err(AppError::ValidationError("Audio file missing".to_string()));
        }
        if !owns_key(&request.owner_id, &request.audio_key) {
            return Err(AppError::NotFound("Recording not found".to_string()));
        }

        let prompt = self.resolve_prompt(&request).await?;
        let script = prompt
            .as_ref()
            .map(|p| p.text.as_str())
            .filter(|text| !text.trim().is_empty());
        let title = prompt
            .as_ref()
            .map(|p| p.title.clone())
            .unwrap_or_else(|| IMPROVISATION_TITLE.to_string());

        info!(
            owner = %request.owner_id,
            audio_key = %request.audio_key,
            scripted = script.is_some(),
            "Starting recording analysis"
        );

        let transcription = self.transcribe(&request.audio_key).await?;
        let gaps = gap_statistics(&transcription.timeline, self.settings.min_gap_seconds);
        let metrics = self.measure(&transcription, gaps, script).await?;
        let scored = score_metrics(metrics, gaps, script.is_some());

        let history = recent_history(
            self.services.reports.as_ref(),
            &request.owner_id,
            self.settings.history_limit,
        )
        .await?;

        let candidates = self
            .services
            .advisor
            .generate(&scored.metrics, &history)
            .await
            .map_err(|e| AppError::upstream("advice generation", e))?;
        let advice = normalize_advice(candidates);

        let score = scored.score;
        let report = self
            .services
            .reports
            .insert(NewReport {
                owner_id: request.owner_id.clone(),
                title,
                audio_key: request.audio_key.clone(),
                transcript: transcription.text,
                prompt_text: script.map(str::to_owned),
                metrics: scored,
                advice,
            })
            .await?;

        info!(
            owner = %request.owner_id,
            report_id = %report.id,
            score = score,
            history_sessions = history.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Recording analysis completed"
        );

        Ok(report.id)
    }

    /// The target prompt, if one was named. Unknown or foreign prompts are "not found".
    async fn resolve_prompt(&self, request: &AnalysisRequest) -> AppResult<Option<Prompt>> {
        let Some(prompt_id) = request.prompt_id else {
            return Ok(None);
        };

        match self.services.prompts.find_prompt(prompt_id).await? {
            Some(prompt) if prompt.owner_id == request.owner_id => Ok(Some(prompt)),
            _ => Err(AppError::NotFound("Prompt not found".to_string())),
        }
    }

    /// Download to a private temp file, transcribe, and always delete the file.
    async fn transcribe(&self, audio_key: &str) -> AppResult<Transcription> {
        let temp_path = tempfile::Builder::new()
            .prefix("recording-")
            .suffix(".webm")
            .tempfile_in(&self.settings.temp_dir)
            .map_err(|e| AppError::Internal(format!("Failed to create temp file: {}", e)))?
            .into_temp_path();

        // Dropping `temp_path` on any early return deletes the file too
        self.services
            .blobs
            .fetch_to_local(audio_key, &temp_path)
            .await
            .map_err(|e| AppError::upstream("audio download", e))?;

        let transcribing = Instant::now();
        let result = self.services.transcriber.transcribe(&temp_path).await;

        if let Err(e) = temp_path.close() {
            warn!(error = %e, "Failed to remove temporary audio file");
        }

        let transcription = result.map_err(|e| AppError::upstream("transcription", e))?;
        info!(
            duration_seconds = transcription.duration_seconds,
            intervals = transcription.timeline.len(),
            elapsed_ms = transcribing.elapsed().as_millis() as u64,
            "Transcription finished"
        );
        Ok(transcription)
    }

    /// Objective metrics plus the model-derived sentiment and sub-scores.
    async fn measure(
        &self,
        transcription: &Transcription,
        gaps: GapStatistics,
        script: Option<&str>,
    ) -> AppResult<Metrics> {
        let text = transcription.text.as_str();

        let sentiment = self
            .services
            .sentiment
            .classify(text)
            .await
            .map_err(|e| AppError::upstream("sentiment analysis", e))?;

        let improvisation = match script {
            Some(_) => None,
            None => Some(
                self.services
                    .improvisation
                    .score_improvisation(text)
                    .await
                    .map_err(|e| AppError::upstream("improvisation scoring", e))?,
            ),
        };

        Ok(Metrics {
            wpm: words_per_minute(text, transcription.duration_seconds),
            filler_rate: filler_rate(text),
            avg_pause_ms: gaps.avg_pause_ms,
            word_error_rate: script
                .and_then(|expected| word_error_rate(expected, text))
                .unwrap_or(0.0),
            sentiment,
            improvisation,
        })
    }
}
