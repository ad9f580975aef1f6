// src/score/mod.rs
//! Relevance scoring of story text against configured interests.

pub mod embedding;
pub mod keyword;

pub use embedding::{Embedder, EmbeddingScorer, HttpEmbedder};
pub use keyword::KeywordScorer;

use anyhow::{bail, Result};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for a single scoring call.
pub const DEFAULT_SCORE_TIMEOUT: Duration = Duration::from_secs(30);

/// Relevance result; `value` is in `[0.0, 1.0]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Score {
    pub value: f64,
    pub reason: String,
}

#[async_trait::async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, text: &str) -> Result<Score>;

    /// Provider identifier, e.g. "keyword".
    fn name(&self) -> &'static str;

    /// Release held resources at shutdown.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub type DynScorer = Arc<dyn Scorer>;

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordConfig {
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    pub interests: Vec<String>,
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
}

/// Scoring strategy, resolved once from configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScoringMode {
    #[default]
    NoScoring,
    Keyword(KeywordConfig),
    Embedding(EmbeddingConfig),
}

impl ScoringMode {
    /// Build the scorer. Embedding mode embeds every interest up front.
    pub async fn build(self) -> Result<Option<DynScorer>> {
        match self {
            ScoringMode::NoScoring => Ok(None),
            ScoringMode::Keyword(cfg) => {
                if cfg.interests.is_empty() {
                    bail!("keyword scoring needs at least one interest");
                }
                Ok(Some(Arc::new(KeywordScorer::new(&cfg.interests))))
            }
            ScoringMode::Embedding(cfg) => {
                let embedder = HttpEmbedder::new(cfg.url, cfg.model, cfg.api_key)?;
                let scorer = EmbeddingScorer::new(Arc::new(embedder), cfg.interests).await?;
                Ok(Some(Arc::new(scorer)))
            }
        }
    }
}

/// Best-effort scoring: errors and timeouts are logged and yield an empty score.
pub async fn score_or_default(scorer: Option<&dyn Scorer>, text: &str, limit: Duration) -> Score {
    let Some(scorer) = scorer else {
        return Score::default();
    };

    match tokio::time::timeout(limit, scorer.score(text)).await {
        Ok(Ok(score)) => score,
        Ok(Err(e)) => {
            tracing::warn!(target: "score", scorer = scorer.name(), error = ?e, "scoring story failed");
            counter!("feed_score_errors_total", "reason" => "error").increment(1);
            Score::default()
        }
        Err(_) => {
            tracing::warn!(target: "score", scorer = scorer.name(), timeout_ms = limit.as_millis() as u64, "scoring story timed out");
            counter!("feed_score_errors_total", "reason" => "timeout").increment(1);
            Score::default()
        }
    }
}
