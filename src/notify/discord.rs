// src/notify/discord.rs
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{hashed_name, Notifier, Story};

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    name: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            name: hashed_name("discord", &webhook),
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }
}

fn payload(story: &Story) -> DiscordWebhookPayload {
    let description = if story.score > 0.0 {
        let reason = if story.reason.is_empty() {
            "-"
        } else {
            story.reason.as_str()
        };
        format!(
            "{}\n**Relevance:** {:.0}% ({})",
            story.url,
            story.score * 100.0,
            reason
        )
    } else {
        story.url.clone()
    };

    DiscordWebhookPayload {
        content: None,
        embeds: vec![DiscordEmbed {
            title: story.title.clone(),
            url: story.url.clone(),
            description,
        }],
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, story: &Story) -> Result<()> {
        let payload = payload(story);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("discord webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("discord webhook request failed: {e}"),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tracing::debug!(sink = %self.name, attempt, error = %err, "discord send retry");
            tokio::time::sleep(backoff(attempt)).await;
        }
    }
}

/// 500ms doubling per attempt, capped at 32s.
fn backoff(attempt: u8) -> Duration {
    let exp = u32::from(attempt.saturating_sub(1)).min(6);
    Duration::from_millis(500u64 << exp)
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    url: String,
    description: String,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}
