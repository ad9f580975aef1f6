// src/score/keyword.rs
//! Keyword-overlap scorer: no model, no network.

use anyhow::Result;
use once_cell::sync::Lazy;
use std::collections::HashSet;

use super::{Score, Scorer};

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "and", "or", "of", "in", "to", "for", "with", "on", "at", "by", "from",
        "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does",
        "did", "will", "would", "could", "should", "may", "might", "must", "shall", "about",
        "into", "through", "during", "before", "after", "above", "below", "between", "under",
        "again", "further", "then", "once", "here", "there", "when", "where", "why", "how", "all",
        "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not", "only", "own",
        "same", "so", "than", "too", "very", "just", "also", "now", "new",
    ]
    .into_iter()
    .collect()
});

const MIN_KEYWORD_LEN: usize = 3;

/// Meaningful lower-case keywords of an interest phrase.
pub fn extract_keywords(phrase: &str) -> Vec<String> {
    phrase
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| ".,!?;:'\"()-".contains(c)))
        .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN && !STOP_WORDS.contains(*w))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct KeywordScorer {
    /// (interest, keywords) in configuration order.
    interests: Vec<(String, Vec<String>)>,
}

impl KeywordScorer {
    pub fn new(interests: &[String]) -> Self {
        Self {
            interests: interests
                .iter()
                .map(|i| (i.clone(), extract_keywords(i)))
                .collect(),
        }
    }

    /// Synchronous core of [`Scorer::score`].
    pub fn evaluate(&self, text: &str) -> Score {
        let lower = text.to_lowercase();
        let mut best = Score::default();

        for (interest, keywords) in &self.interests {
            if keywords.is_empty() {
                continue;
            }
            let hits = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
            let value = hits as f64 / keywords.len() as f64;
            if value > best.value {
                best = Score {
                    value,
                    reason: interest.clone(),
                };
            }
        }
        best
    }
}

#[async_trait::async_trait]
impl Scorer for KeywordScorer {
    async fn score(&self, text: &str) -> Result<Score> {
        Ok(self.evaluate(text))
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_words_and_short_tokens_are_dropped() {
        assert_eq!(
            extract_keywords("The future of Rust, in the Linux kernel!"),
            vec!["future", "rust", "linux", "kernel"]
        );
        assert!(extract_keywords("a an of AI").is_empty());
    }

    #[test]
    fn best_interest_wins() {
        let scorer = KeywordScorer::new(&[
            "rust programming language".to_string(),
            "linux kernel".to_string(),
        ]);
        let s = scorer.evaluate("New Linux kernel release");
        assert_eq!(s.value, 1.0);
        assert_eq!(s.reason, "linux kernel");

        let s = scorer.evaluate("Rust 2.0 announced");
        assert!((s.value - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(s.reason, "rust programming language");
    }

    #[test]
    fn no_match_scores_zero_with_empty_reason() {
        let scorer = KeywordScorer::new(&["gardening tips".to_string()]);
        assert_eq!(scorer.evaluate("Stock markets fall"), Score::default());
    }

    #[test]
    fn keywords_match_as_substrings() {
        let scorer = KeywordScorer::new(&["database".to_string()]);
        assert_eq!(scorer.evaluate("Databases at scale").value, 1.0);
    }
}
