//! # Advice Normalizer
//!
//! The advice model is asked for exactly four labeled items but nothing forces it
//! to comply. [`normalize_advice`] coerces whatever came back into exactly
//! [`ADVICE_COUNT`] items so report rendering never sees a malformed list.
//!
//! ## Policy:
//! 1. Items without text are dropped.
//! 2. Items whose label is not exactly `positive` or `improvement` are labeled by
//!    position among the items kept so far: the first two become `positive`,
//!    the rest `improvement`.
//! 3. Short lists are padded with [`PLACEHOLDER_ADVICE`] using the same rule.
//! 4. Long lists are truncated to the first four.

use crate::analysis::types::{AdviceCandidate, AdviceItem, AdviceLabel};

pub const ADVICE_COUNT: usize = 4;
pub const PLACEHOLDER_ADVICE: &str = "Additional feedback.";

/// Positions below this default to positive feedback.
const POSITIVE_SLOTS: usize = 2;

fn positional_label(position: usize) -> AdviceLabel {
    if position < POSITIVE_SLOTS {
        AdviceLabel::Positive
    } else {
        AdviceLabel::Improvement
    }
}

pub fn normalize_advice(candidates: Vec<AdviceCandidate>) -> Vec<AdviceItem> {
    let mut fixed: Vec<AdviceItem> = Vec::with_capacity(ADVICE_COUNT);

    for candidate in candidates {
        let text = match candidate.text {
            Some(text) if !text.trim().is_empty() => text,
            _ => continue,
        };

        let label = candidate
            .label
            .as_deref()
            .and_then(AdviceLabel::parse_exact)
            .unwrap_or_else(|| positional_label(fixed.len()));

        fixed.push(AdviceItem::new(text, label));
    }

    while fixed.len() < ADVICE_COUNT {
        let label = positional_label(fixed.len());
        fixed.push(AdviceItem::new(PLACEHOLDER_ADVICE, label));
    }

    fixed.truncate(ADVICE_COUNT);
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: Option<&str>, label: Option<&str>) -> AdviceCandidate {
        AdviceCandidate {
            text: text.map(str::to_owned),
            label: label.map(str::to_owned),
        }
    }

    #[test]
    fn test_empty_input_is_padded() {
        let advice = normalize_advice(Vec::new());
        assert_eq!(advice.len(), ADVICE_COUNT);
        assert!(advice.iter().all(|a| a.text == PLACEHOLDER_ADVICE));
        let labels: Vec<AdviceLabel> = advice.iter().map(|a| a.label).collect();
        assert_eq!(
            labels,
            vec![
                AdviceLabel::Positive,
                AdviceLabel::Positive,
                AdviceLabel::Improvement,
                AdviceLabel::Improvement
            ]
        );
    }

    #[test]
    fn test_valid_input_passes_unchanged() {
        let input = vec![
            candidate(Some("Great pace"), Some("improvement")),
            candidate(Some("Clear voice"), Some("positive")),
            candidate(Some("Fewer fillers"), Some("improvement")),
            candidate(Some("Good energy"), Some("positive")),
        ];

        let advice = normalize_advice(input);
        assert_eq!(
            advice,
            vec![
                AdviceItem::new("Great pace", AdviceLabel::Improvement),
                AdviceItem::new("Clear voice", AdviceLabel::Positive),
                AdviceItem::new("Fewer fillers", AdviceLabel::Improvement),
                AdviceItem::new("Good energy", AdviceLabel::Positive),
            ]
        );
    }

    #[test]
    fn test_missing_text_is_dropped_and_labels_follow_retained_position() {
        let input = vec![
            candidate(None, Some("positive")),
            candidate(Some(""), Some("positive")),
            candidate(Some("first"), None),
            candidate(Some("second"), Some("Positive")),
            candidate(Some("third"), Some("meh")),
        ];

        let advice = normalize_advice(input);
        assert_eq!(
            advice,
            vec![
                AdviceItem::new("first", AdviceLabel::Positive),
                AdviceItem::new("second", AdviceLabel::Positive),
                AdviceItem::new("third", AdviceLabel::Improvement),
                AdviceItem::new(PLACEHOLDER_ADVICE, AdviceLabel::Improvement),
            ]
        );
    }

    #[test]
    fn test_long_input_is_truncated() {
        let input: Vec<AdviceCandidate> = (0..10)
            .map(|i| candidate(Some(&format!("tip {}", i)), Some("improvement")))
            .collect();

        let advice = normalize_advice(input);
        assert_eq!(advice.len(), ADVICE_COUNT);
        assert_eq!(advice[3].text, "tip 3");
    }

    #[test]
    fn test_any_input_yields_four_well_formed_items() {
        let texts = [None, Some(""), Some("a"), Some("b")];
        let labels = [None, Some("positive"), Some("improvement"), Some("other")];

        for len in 0..=10 {
            let input: Vec<AdviceCandidate> = (0..len)
                .map(|i| candidate(texts[i % texts.len()], labels[(i / 2) % labels.len()]))
                .collect();

            let advice = normalize_advice(input);
            assert_eq!(advice.len(), ADVICE_COUNT, "input length {}", len);
            assert!(advice.iter().all(|a| !a.text.is_empty()));
        }
    }
}
