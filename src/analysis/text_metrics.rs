//! # Text Metrics
//!
//! Pure functions over a transcript and its timeline. No I/O, no allocation
//! beyond what tokenization needs.
//!
//! ## Metrics:
//! - **Word error rate**: edit distance against the target script, as a percentage
//!   of the script's word count
//! - **Filler rate**: share of tokens that are disfluencies ("um", "you know", "يعني", ...)
//! - **Gap statistics**: average pause length and number of long pauses
//! - **Words per minute**: speaking tempo

use crate::analysis::types::TimelineInterval;
use regex::Regex;
use std::sync::OnceLock;

/// Gaps shorter than this are treated as normal articulation, not pauses.
pub const DEFAULT_MIN_GAP_SECONDS: f64 = 0.25;

/// A pause at least this long counts as a long pause.
pub const LONG_PAUSE_SECONDS: f64 = 1.0;

/// English and Arabic colloquial fillers. Order matters: alternation is leftmost-first.
const FILLERS: &str = "um+|uh+|er+|ah+|like|you know|I mean|well|so|actually|basically|literally|kind of|sort of|right|okay|you see|hmm+|huh+|mm+|mmm+|يعني+|اه+|مم+|ام+|شو+|اوك|طيب|خلينا|اصلا|فيعني|ها|ااا|اهه|والله|فهمت|ايش|اوكي|همم|مثلا|هيك|يعني يعني";

fn filler_regex() -> &'static Regex {
    static FILLER_REGEX: OnceLock<Regex> = OnceLock::new();
    FILLER_REGEX.get_or_init(|| {
        Regex::new(&format!(r"(?i)\b(?:{})\b", FILLERS)).expect("filler pattern is a valid regex")
    })
}

/// Pause structure of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GapStatistics {
    pub avg_pause_ms: f64,
    pub long_pauses: u32,
}

/// Edit distance between the lower-cased, whitespace-normalized texts, relative to
/// the number of words in `expected`, times 100.
///
/// The distance is counted in characters over the re-joined token strings, not in
/// whole tokens, so scores stay comparable with reports already stored.
///
/// Returns `None` when `expected` has no words: there is nothing to compare against.
pub fn word_error_rate(expected: &str, actual: &str) -> Option<f64> {
    let expected = expected.to_lowercase();
    let reference: Vec<&str> = expected.split_whitespace().collect();
    if reference.is_empty() {
        return None;
    }

    let actual = actual.to_lowercase();
    let hypothesis: Vec<&str> = actual.split_whitespace().collect();

    let distance = levenshtein(&reference.join(" "), &hypothesis.join(" "));
    Some(distance as f64 / reference.len() as f64 * 100.0)
}

/// Percentage of whitespace tokens matched by the filler list, in [0, 100].
pub fn filler_rate(text: &str) -> f64 {
    let total = text.split_whitespace().count();
    if total == 0 {
        return 0.0;
    }

    // "um,uh" is one token but two matches
    let fillers = filler_regex().find_iter(text).count();
    (fillers as f64 / total as f64 * 100.0).min(100.0)
}

/// Average pause (ms) and long-pause count over gaps of at least `min_gap` seconds.
pub fn gap_statistics(timeline: &[TimelineInterval], min_gap: f64) -> GapStatistics {
    if timeline.len() < 2 {
        return GapStatistics::default();
    }

    let gaps: Vec<f64> = timeline
        .windows(2)
        .map(|pair| pair[1].start - pair[0].end)
        .filter(|gap| *gap >= min_gap)
        .collect();

    if gaps.is_empty() {
        return GapStatistics::default();
    }

    let avg_pause_ms = gaps.iter().sum::<f64>() / gaps.len() as f64 * 1000.0;
    let long_pauses = gaps.iter().filter(|gap| **gap >= LONG_PAUSE_SECONDS).count() as u32;

    GapStatistics {
        avg_pause_ms,
        long_pauses,
    }
}

/// Spoken words per minute, rounded. Zero when the duration is unknown.
pub fn words_per_minute(transcript: &str, duration_seconds: f64) -> u32 {
    if !(duration_seconds > 0.0) {
        return 0;
    }
    let words = transcript.split_whitespace().count();
    (words as f64 / duration_seconds * 60.0).round() as u32
}

/// Character-level Levenshtein distance, two-row dynamic programming.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intervals(pairs: &[(f64, f64)]) -> Vec<TimelineInterval> {
        pairs.iter().map(|&(s, e)| TimelineInterval::new(s, e)).collect()
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_word_error_rate_identical() {
        assert_eq!(word_error_rate("hello world", "hello world"), Some(0.0));
    }

    #[test]
    fn test_word_error_rate_ignores_case_and_spacing() {
        assert_eq!(word_error_rate("Hello   World", "hello world\n"), Some(0.0));
    }

    #[test]
    fn test_word_error_rate_counts_characters() {
        // "hello world" vs "hello word": one character deleted, two reference words
        assert_eq!(word_error_rate("hello world", "hello word"), Some(50.0));
    }

    #[test]
    fn test_word_error_rate_empty_expected() {
        assert_eq!(word_error_rate("", "anything"), None);
        assert_eq!(word_error_rate("   ", "anything"), None);
    }

    #[test]
    fn test_filler_rate_no_fillers() {
        assert_eq!(filler_rate("The quick brown fox jumps"), 0.0);
        assert_eq!(filler_rate(""), 0.0);
    }

    #[test]
    fn test_filler_rate_counts_matches() {
        // "Um" and "you know" match; 8 tokens total
        let rate = filler_rate("Um I think you know the plan works");
        assert!((rate - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_filler_rate_word_boundaries() {
        // "summary" and "soldier" must not match "um" or "so"
        assert_eq!(filler_rate("summary soldier"), 0.0);
        assert!((filler_rate("ummm hello") - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_filler_rate_arabic() {
        let rate = filler_rate("يعني الفكرة واضحة");
        assert!((rate - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_filler_rate_is_bounded() {
        assert_eq!(filler_rate("um,uh,er"), 100.0);
        for text in ["so so so", "like", "okay right well", "plain words only"] {
            let rate = filler_rate(text);
            assert!((0.0..=100.0).contains(&rate), "{} -> {}", text, rate);
        }
    }

    #[test]
    fn test_gap_statistics_short_timelines() {
        let zero = GapStatistics { avg_pause_ms: 0.0, long_pauses: 0 };
        assert_eq!(gap_statistics(&[], DEFAULT_MIN_GAP_SECONDS), zero);
        assert_eq!(
            gap_statistics(&intervals(&[(0.0, 5.0)]), DEFAULT_MIN_GAP_SECONDS),
            zero
        );
    }

    #[test]
    fn test_gap_statistics_filters_short_gaps() {
        // gaps: 0.1 (ignored), 0.5, 1.5
        let timeline = intervals(&[(0.0, 1.0), (1.1, 2.0), (2.5, 3.0), (4.5, 5.0)]);
        let stats = gap_statistics(&timeline, DEFAULT_MIN_GAP_SECONDS);
        assert!((stats.avg_pause_ms - 1000.0).abs() < 1e-9);
        assert_eq!(stats.long_pauses, 1);
    }

    #[test]
    fn test_gap_statistics_no_qualifying_gaps() {
        let timeline = intervals(&[(0.0, 1.0), (1.0, 2.0), (2.1, 3.0)]);
        assert_eq!(
            gap_statistics(&timeline, DEFAULT_MIN_GAP_SECONDS),
            GapStatistics::default()
        );
    }

    #[test]
    fn test_words_per_minute() {
        assert_eq!(words_per_minute("one two three four", 2.0), 120);
        assert_eq!(words_per_minute("one two three", 0.0), 0);
        assert_eq!(words_per_minute("", 30.0), 0);
    }
}
