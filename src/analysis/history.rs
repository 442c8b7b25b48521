//! # History Aggregator
//!
//! Turns a user's most recent reports into uniform context for the advice model.
//! Stored records may predate newer fields or lack the improvisation sub-scores,
//! so every absent number becomes 0 and an absent sentiment becomes neutral.
//! This is one of the two places where the pipeline repairs data instead of failing.

use crate::analysis::types::{HistoryEntry, HistoryMetrics, HistoryRow, StoredMetrics};
use crate::store::ReportStore;
use anyhow::Result;

/// Number of past sessions given to the advice model unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Fill every absent field with its neutral value.
pub fn normalize_metrics(stored: &StoredMetrics) -> HistoryMetrics {
    HistoryMetrics {
        wpm: stored.wpm.unwrap_or(0),
        filler_rate: stored.filler_rate.unwrap_or(0.0),
        avg_pause_ms: stored.avg_pause_ms.unwrap_or(0.0),
        word_error_rate: stored.word_error_rate.unwrap_or(0.0),
        sentiment: stored.sentiment.unwrap_or_default(),
        clarity: stored.clarity.unwrap_or(0),
        engagement: stored.engagement.unwrap_or(0),
        conciseness: stored.conciseness.unwrap_or(0),
    }
}

/// Convert newest-first rows into oldest-first history entries.
///
/// Rows without any stored metrics carry no information and are dropped.
pub fn normalize_history(rows: Vec<HistoryRow>) -> Vec<HistoryEntry> {
    rows.into_iter()
        .rev()
        .filter_map(|row| {
            row.metrics.as_ref().map(|stored| HistoryEntry {
                created_at: row.created_at,
                metrics: normalize_metrics(stored),
            })
        })
        .collect()
}

/// Fetch the last `limit` sessions of `owner_id`, oldest first.
pub async fn recent_history(
    store: &dyn ReportStore,
    owner_id: &str,
    limit: usize,
) -> Result<Vec<HistoryEntry>> {
    let rows = store.recent_metrics(owner_id, limit).await?;
    Ok(normalize_history(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::Sentiment;
    use chrono::{Duration, Utc};

    #[test]
    fn test_missing_fields_default_to_neutral() {
        let stored = StoredMetrics {
            wpm: Some(128),
            filler_rate: Some(3.5),
            ..StoredMetrics::default()
        };

        let normalized = normalize_metrics(&stored);
        assert_eq!(normalized.wpm, 128);
        assert_eq!(normalized.filler_rate, 3.5);
        assert_eq!(normalized.avg_pause_ms, 0.0);
        assert_eq!(normalized.word_error_rate, 0.0);
        assert_eq!(normalized.sentiment, Sentiment::Neutral);
        assert_eq!(normalized.clarity, 0);
        assert_eq!(normalized.engagement, 0);
        assert_eq!(normalized.conciseness, 0);
    }

    #[test]
    fn test_history_is_reversed_to_oldest_first() {
        let now = Utc::now();
        let rows = vec![
            HistoryRow {
                created_at: now,
                metrics: Some(StoredMetrics { wpm: Some(3), ..Default::default() }),
            },
            HistoryRow {
                created_at: now - Duration::minutes(5),
                metrics: Some(StoredMetrics { wpm: Some(2), ..Default::default() }),
            },
            HistoryRow {
                created_at: now - Duration::minutes(10),
                metrics: Some(StoredMetrics { wpm: Some(1), ..Default::default() }),
            },
        ];

        let history = normalize_history(rows);
        let wpms: Vec<u32> = history.iter().map(|h| h.metrics.wpm).collect();
        assert_eq!(wpms, vec![1, 2, 3]);
    }

    #[test]
    fn test_rows_without_metrics_are_dropped() {
        let rows = vec![
            HistoryRow { created_at: Utc::now(), metrics: None },
            HistoryRow { created_at: Utc::now(), metrics: Some(StoredMetrics::default()) },
        ];
        assert_eq!(normalize_history(rows).len(), 1);
    }
}
