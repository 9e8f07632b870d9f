// src/sentiment.rs
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::analyze::patterns::{NEGATIVE_KEYWORDS, POSITIVE_KEYWORDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Returns (positive hits, negative hits).
    ///
    /// Each keyword counts at most once per side. A positive keyword that is
    /// part of a negative phrase (`מקצועי` in `לא מקצועי`, `professional` in
    /// `unprofessional`) is ignored; one preceded by a negator within the
    /// last 1..=3 tokens counts as negative instead.
    pub fn score_text(&self, text: &str) -> (u32, u32) {
        let lower = text.to_lowercase();

        let mut negative_spans: Vec<Range<usize>> = Vec::new();
        let mut neg = 0u32;
        for kw in NEGATIVE_KEYWORDS {
            let spans: Vec<Range<usize>> = lower
                .match_indices(kw)
                .map(|(i, _)| i..i + kw.len())
                .collect();
            if !spans.is_empty() {
                neg += 1;
                negative_spans.extend(spans);
            }
        }

        let mut pos = 0u32;
        for kw in POSITIVE_KEYWORDS {
            let mut plain = false;
            let mut negated = false;
            for (i, _) in lower.match_indices(kw) {
                let span = i..i + kw.len();
                if negative_spans.iter().any(|n| n.start <= span.start && span.end <= n.end) {
                    continue;
                }
                if is_negated_at(&lower, i) {
                    negated = true;
                } else {
                    plain = true;
                }
            }
            if plain {
                pos += 1;
            }
            if negated {
                neg += 1;
            }
        }

        (pos, neg)
    }

    pub fn analyze(&self, text: &str) -> Sentiment {
        let (pos, neg) = self.score_text(text);
        match pos.cmp(&neg) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }
}

/// Is the word starting at byte `start` negated by one of the 1..=3 tokens
/// right before it? `text` is expected to be lower-cased already.
pub(crate) fn is_negated_at(text: &str, start: usize) -> bool {
    let Some(before) = text.get(..start) else {
        return false;
    };
    tokenize(before).rev().take(3).any(is_negator)
}

/// Word tokens (letters, digits, apostrophes) in order.
fn tokenize(s: &str) -> impl DoubleEndedIterator<Item = &str> {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "לא" | "אל"
            | "בלי"
            | "not"
            | "no"
            | "never"
            | "don't"
            | "dont"
            | "doesn't"
            | "didn't"
            | "wouldn't"
            | "isn't"
            | "wasn't"
            | "can't"
            | "cannot"
            | "without"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_hebrew_recommendation_is_positive() {
        let s = SentimentAnalyzer::new();
        assert_eq!(
            s.analyze("ממליצה בחום! הבן שלי עשה אצלם קורס והיה מעולה"),
            Sentiment::Positive
        );
    }

    #[test]
    fn negated_positive_counts_as_negative() {
        let s = SentimentAnalyzer::new();
        assert_eq!(s.score_text("not great at all"), (0, 1));
        assert_eq!(s.analyze("לא מקצועי ויקר"), Sentiment::Negative);
    }

    #[test]
    fn unprofessional_is_not_professional() {
        let s = SentimentAnalyzer::new();
        assert_eq!(s.score_text("totally unprofessional"), (0, 1));
    }

    #[test]
    fn case_insensitive_and_neutral_on_tie() {
        let s = SentimentAnalyzer::new();
        assert_eq!(s.analyze("GREAT teacher, TERRIBLE parking"), Sentiment::Neutral);
        assert_eq!(s.analyze("שלום לכולם"), Sentiment::Neutral);
    }

    #[test]
    fn negator_window_is_three_tokens() {
        assert!(is_negated_at("i do not really love", 16));
        assert!(!is_negated_at("not that i would say i love", 23));
    }
}
