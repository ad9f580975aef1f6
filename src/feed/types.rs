// src/feed/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

/// A single normalized feed entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Item {
    pub title: String,
    pub link: String,
    /// Parsed publication time; `None` when absent or unparseable.
    pub published: Option<DateTime<Utc>>,
    /// Timestamp exactly as it appeared in the feed (used for identities).
    pub published_raw: String,
}

impl Item {
    pub fn new(title: impl Into<String>, link: impl Into<String>, published_raw: impl Into<String>) -> Self {
        let published_raw = published_raw.into();
        Self {
            title: title.into(),
            link: link.into(),
            published: super::timeparse::parse_utc(&published_raw),
            published_raw,
        }
    }
}

/// Retrieves and normalizes the entries of one feed URL.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<Item>>;
}
