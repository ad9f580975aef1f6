use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::{hashed_name, Notifier, Story};

pub struct SlackNotifier {
    webhook_url: String,
    name: String,
    client: Client,
    timeout: Duration,
}

impl SlackNotifier {
    pub fn new(url: String) -> Self {
        Self {
            name: hashed_name("slack", &url),
            webhook_url: url,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

fn text(story: &Story) -> String {
    let mut t = format!("*{}*\n{}", story.title, story.url);
    if story.score > 0.0 {
        t.push_str(&format!("\nRelevance: {:.0}% {}", story.score * 100.0, story.reason));
    }
    t
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, story: &Story) -> Result<()> {
        let body = serde_json::json!({ "text": text(story) });

        self.client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }
}
