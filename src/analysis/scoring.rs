//! # Scoring Engine
//!
//! Folds the objective metrics into one composite score between 0 and 100.
//!
//! ## Penalty Formula:
//! | term | penalty |
//! |---|---|
//! | tempo | `|wpm - 135| * 0.4` |
//! | fillers | `filler_rate * 1.5` |
//! | script accuracy | `word_error_rate * 0.5` (scripted prompts only) |
//! | long pauses | `long_pauses * 2` |
//! | pause regularity | `|avg_pause_ms - 400| / 40` |
//! | content | `((10 - clarity) + (10 - engagement) + (10 - conciseness)) * 0.7` (improvisation only) |
//!
//! `score = max(0, 100 - sum)`. The coefficients are part of the stored report
//! format; changing them makes old and new scores incomparable.

use crate::analysis::text_metrics::GapStatistics;
use crate::analysis::types::{ImprovisationScores, Metrics, ScoredMetrics};

pub const TARGET_WPM: f64 = 135.0;
pub const TARGET_PAUSE_MS: f64 = 400.0;

const TEMPO_WEIGHT: f64 = 0.4;
const FILLER_WEIGHT: f64 = 1.5;
const WORD_ERROR_WEIGHT: f64 = 0.5;
const LONG_PAUSE_WEIGHT: f64 = 2.0;
const PAUSE_REGULARITY_DIVISOR: f64 = 40.0;
const CONTENT_WEIGHT: f64 = 0.7;

/// Everything the score depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInputs {
    pub wpm: u32,
    pub filler_rate: f64,
    pub word_error_rate: f64,
    pub avg_pause_ms: f64,
    pub long_pauses: u32,
    pub has_target_script: bool,
    pub improvisation: Option<ImprovisationScores>,
}

/// Individual penalty terms, kept separate for logging.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PenaltyBreakdown {
    pub tempo: f64,
    pub filler: f64,
    pub word_error: f64,
    pub long_pause: f64,
    pub pause_regularity: f64,
    pub content: f64,
}

impl PenaltyBreakdown {
    pub fn total(&self) -> f64 {
        self.tempo + self.filler + self.word_error + self.long_pause + self.pause_regularity + self.content
    }

    /// Composite score in [0, 100].
    pub fn score(&self) -> f64 {
        (100.0 - self.total()).max(0.0)
    }
}

pub fn penalties(inputs: &ScoreInputs) -> PenaltyBreakdown {
    PenaltyBreakdown {
        tempo: (inputs.wpm as f64 - TARGET_WPM).abs() * TEMPO_WEIGHT,
        filler: inputs.filler_rate * FILLER_WEIGHT,
        word_error: if inputs.has_target_script {
            inputs.word_error_rate * WORD_ERROR_WEIGHT
        } else {
            0.0
        },
        long_pause: inputs.long_pauses as f64 * LONG_PAUSE_WEIGHT,
        pause_regularity: (inputs.avg_pause_ms - TARGET_PAUSE_MS).abs() / PAUSE_REGULARITY_DIVISOR,
        content: inputs.improvisation.map(content_penalty).unwrap_or(0.0),
    }
}

fn content_penalty(scores: ImprovisationScores) -> f64 {
    let shortfall = |value: u8| f64::from(ImprovisationScores::MAX.saturating_sub(value));
    (shortfall(scores.clarity) + shortfall(scores.engagement) + shortfall(scores.conciseness))
        * CONTENT_WEIGHT
}

/// Attach pause count and score to a finished metrics record.
pub fn score_metrics(metrics: Metrics, gaps: GapStatistics, has_target_script: bool) -> ScoredMetrics {
    let inputs = ScoreInputs {
        wpm: metrics.wpm,
        filler_rate: metrics.filler_rate,
        word_error_rate: metrics.word_error_rate,
        avg_pause_ms: metrics.avg_pause_ms,
        long_pauses: gaps.long_pauses,
        has_target_script,
        improvisation: metrics.improvisation,
    };

    let breakdown = penalties(&inputs);
    tracing::debug!(?breakdown, "Computed score penalties");

    ScoredMetrics {
        score: breakdown.score(),
        long_pauses: gaps.long_pauses,
        metrics,
    }
}
