use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use reqwest::Client;
use std::time::{Duration, Instant};

use super::{parse_feed, Fetcher, Item};

const USER_AGENT: &str = concat!("feed-sentry/", env!("CARGO_PKG_VERSION"));

/// Fetches feeds over HTTP(S) and parses them as RSS or Atom.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<Item>> {
        let t0 = Instant::now();
        let body = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?
            .text()
            .await
            .with_context(|| format!("reading body of {url}"))?;

        let items = parse_feed(&body).with_context(|| format!("parsing feed {url}"))?;
        histogram!("feed_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(items)
    }
}
