// src/notify/telegram.rs
use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Notifier, Story};

const API_BASE: &str = "https://api.telegram.org";

/// Characters MarkdownV2 reserves outside of entities (plus `,` for safety).
const RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', ',', '!',
];

pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
    name: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    parse_mode: &'static str,
    text: String,
    reply_markup: ReplyMarkup<'a>,
}

#[derive(Serialize)]
struct ReplyMarkup<'a> {
    inline_keyboard: Vec<Vec<InlineButton<'a>>>,
}

#[derive(Serialize)]
struct InlineButton<'a> {
    text: &'static str,
    url: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Result<Self> {
        if bot_token.trim().is_empty() {
            bail!("telegram bot token is required");
        }
        if chat_id.trim().is_empty() {
            bail!("telegram chat id is required");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("building telegram http client")?;
        Ok(Self {
            client,
            api_base: API_BASE.to_string(),
            name: format!("telegram-{chat_id}"),
            bot_token,
            chat_id,
        })
    }

    /// Point at a different Bot API server (self-hosted or test).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Message body; a score line is prepended only for scored stories.
pub fn render(story: &Story) -> String {
    let body = format!(
        "*{}*\n\n{}",
        escape_markdown_v2(&story.title),
        escape_markdown_v2(&story.url)
    );
    if story.score > 0.0 {
        format!("📊 Relevance Score: {:.0}%\n\n{body}", story.score * 100.0)
    } else {
        body
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, story: &Story) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let msg = SendMessage {
            chat_id: &self.chat_id,
            parse_mode: "MarkdownV2",
            text: render(story),
            reply_markup: ReplyMarkup {
                inline_keyboard: vec![vec![InlineButton {
                    text: "Read",
                    url: &story.url,
                }]],
            },
        };

        // Telegram answers errors with a JSON body too, so don't bail on status first.
        let resp: ApiResponse = self
            .client
            .post(&url)
            .json(&msg)
            .send()
            .await
            .context("telegram request")?
            .json()
            .await
            .context("decoding telegram response")?;

        if !resp.ok {
            bail!("telegram rejected message: {}", resp.description);
        }
        Ok(())
    }
}
