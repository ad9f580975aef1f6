// src/notify/mod.rs
//! Notification sinks. Each sink's `name()` is also its dedup namespace.

pub mod discord;
pub mod email;
pub mod slack;
pub mod stdout;
pub mod telegram;

pub use discord::DiscordNotifier;
pub use email::EmailNotifier;
pub use slack::SlackNotifier;
pub use stdout::StdoutNotifier;
pub use telegram::TelegramNotifier;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::SinkConfig;
use crate::filter::content_hash;

/// Outgoing message. Score fields are left out of JSON when unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub title: String,
    pub url: String,
    #[serde(
        rename = "relevanceScore",
        default,
        skip_serializing_if = "is_zero"
    )]
    pub score: f64,
    #[serde(
        rename = "scoreReason",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub reason: String,
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Stable identifier; survives restarts with the same configuration.
    fn name(&self) -> &str;
    async fn send(&self, story: &Story) -> Result<()>;
}

pub type DynNotifier = Arc<dyn Notifier>;

/// `<kind>-<first 12 hex chars of sha256(secret)>`, so webhook URLs never hit the store file.
pub fn hashed_name(kind: &str, secret: &str) -> String {
    let h = content_hash(secret);
    format!("{kind}-{}", &h[..12])
}

/// Build the sink described by `cfg`. Secrets must already be resolved.
pub fn build_notifier(cfg: &SinkConfig) -> Result<DynNotifier> {
    let n: DynNotifier = match cfg {
        SinkConfig::Stdout => Arc::new(StdoutNotifier),
        SinkConfig::Telegram { bot_token, chat_id } => {
            Arc::new(TelegramNotifier::new(bot_token.clone(), chat_id.clone())?)
        }
        SinkConfig::Discord { webhook_url } => Arc::new(DiscordNotifier::new(webhook_url.clone())),
        SinkConfig::Slack { webhook_url } => Arc::new(SlackNotifier::new(webhook_url.clone())),
        SinkConfig::Email(smtp) => Arc::new(EmailNotifier::new(smtp)?),
    };
    tracing::debug!(sink = n.name(), "notifier ready");
    Ok(n)
}
