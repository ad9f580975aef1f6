// src/score/embedding.rs
//! Semantic scorer: cosine similarity between the story embedding and
//! pre-computed interest embeddings.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{Score, Scorer};

/// Turns text into a vector. Implementations must be shareable across tasks.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Client for any OpenAI-compatible `/v1/embeddings` endpoint
/// (Ollama, OpenAI, LiteLLM, ...).
#[derive(Clone)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(url: String, model: String, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building embedding http client")?;
        Ok(Self {
            client,
            url,
            model,
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut req = self.client.post(&self.url).json(&EmbeddingRequest {
            model: &self.model,
            input: text,
        });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("embedding request to {}", self.url))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("embedding API returned {}: {}", status.as_u16(), body);
        }

        let parsed: EmbeddingResponse = resp.json().await.context("parsing embedding response")?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("embedding response had no data")
    }
}

/// Cosine similarity; 0.0 for empty, mismatched or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

pub struct EmbeddingScorer {
    embedder: Arc<dyn Embedder>,
    interests: Vec<(String, Vec<f32>)>,
}

impl EmbeddingScorer {
    /// Embeds each interest once; any failure aborts construction.
    pub async fn new(embedder: Arc<dyn Embedder>, interests: Vec<String>) -> Result<Self> {
        if interests.is_empty() {
            bail!("embedding scoring needs at least one interest");
        }
        let mut embedded = Vec::with_capacity(interests.len());
        for interest in interests {
            let v = embedder
                .embed(&interest)
                .await
                .with_context(|| format!("embedding interest {interest:?}"))?;
            embedded.push((interest, v));
        }
        tracing::info!(target: "score", interests = embedded.len(), "interest embeddings ready");
        Ok(Self {
            embedder,
            interests: embedded,
        })
    }
}

#[async_trait]
impl Scorer for EmbeddingScorer {
    async fn score(&self, text: &str) -> Result<Score> {
        let v = self.embedder.embed(text).await.context("embedding story text")?;

        let (best_sim, reason) = self
            .interests
            .iter()
            .map(|(interest, iv)| (cosine_similarity(&v, iv), interest))
            .fold((f64::NEG_INFINITY, None), |acc, (sim, interest)| {
                if sim > acc.0 {
                    (sim, Some(interest))
                } else {
                    acc
                }
            });

        Ok(Score {
            value: ((best_sim + 1.0) / 2.0).clamp(0.0, 1.0),
            reason: reason.cloned().unwrap_or_default(),
        })
    }

    fn name(&self) -> &'static str {
        "embedding"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Fixed vectors per text; unknown text maps to the zero vector.
    struct TableEmbedder(HashMap<&'static str, Vec<f32>>);

    #[async_trait]
    impl Embedder for TableEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(self.0.get(text).cloned().unwrap_or_else(|| vec![0.0, 0.0]))
        }
    }

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(TableEmbedder(HashMap::from([
            ("rust", vec![1.0, 0.0]),
            ("cooking", vec![0.0, 1.0]),
            ("rust story", vec![0.9, 0.1]),
            ("anti rust", vec![-1.0, 0.0]),
        ])))
    }

    #[test]
    fn cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn best_matching_interest_is_reported() {
        let scorer = EmbeddingScorer::new(embedder(), vec!["rust".into(), "cooking".into()])
            .await
            .unwrap();
        let s = scorer.score("rust story").await.unwrap();
        assert_eq!(s.reason, "rust");
        assert!(s.value > 0.95 && s.value <= 1.0, "{}", s.value);
    }

    #[tokio::test]
    async fn opposite_vector_normalizes_to_zero() {
        let scorer = EmbeddingScorer::new(embedder(), vec!["rust".into()])
            .await
            .unwrap();
        let s = scorer.score("anti rust").await.unwrap();
        assert!(s.value.abs() < 1e-9);
        assert_eq!(s.reason, "rust");
    }

    #[tokio::test]
    async fn requires_interests() {
        assert!(EmbeddingScorer::new(embedder(), vec![]).await.is_err());
    }
}
