// src/config/file.rs
//! On-disk configuration shape (TOML or JSON). Resolved into [`super::Config`].

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    #[serde(
        alias = "sleepDurationBetweenFeedParsing",
        skip_serializing_if = "Option::is_none"
    )]
    pub feed_parse_interval: Option<String>,
    #[serde(
        alias = "sleepDurationBetweenBroadcasts",
        skip_serializing_if = "Option::is_none"
    )]
    pub broadcast_interval: Option<String>,
    #[serde(alias = "storageFilePath", skip_serializing_if = "Option::is_none")]
    pub storage_file: Option<PathBuf>,
    #[serde(alias = "persistInterval", skip_serializing_if = "Option::is_none")]
    pub persist_interval: Option<String>,
    #[serde(alias = "metricsAddr", skip_serializing_if = "Option::is_none")]
    pub metrics_addr: Option<String>,

    // Single-application layout of older config files.
    #[serde(alias = "broadcastType", skip_serializing_if = "Option::is_none")]
    pub broadcast_type: Option<String>,
    #[serde(
        alias = "telegramBotAPIToken",
        alias = "telegramBotApiToken",
        skip_serializing_if = "Option::is_none"
    )]
    pub telegram_bot_token: Option<String>,
    #[serde(alias = "telegramChatID", skip_serializing_if = "Option::is_none")]
    pub telegram_chat_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<FileSource>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring: Option<FileScoring>,
    pub apps: Vec<FileApp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSource {
    pub url: String,
    #[serde(alias = "ignoreStoriesBefore", skip_serializing_if = "Option::is_none")]
    pub ignore_before: Option<String>,
    #[serde(alias = "mustIncludeAnyOf", skip_serializing_if = "Vec::is_empty")]
    pub must_include: Vec<String>,
    #[serde(alias = "mustExcludeAnyOf", skip_serializing_if = "Vec::is_empty")]
    pub must_exclude: Vec<String>,
    #[serde(alias = "statusPage")]
    pub status_page: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileApp {
    pub sink: FileSink,
    #[serde(default)]
    pub sources: Vec<FileSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileSink {
    Stdout,
    Telegram {
        #[serde(default, alias = "botToken")]
        bot_token: String,
        #[serde(default, alias = "chatId", alias = "chatID")]
        chat_id: String,
    },
    Discord {
        #[serde(default, alias = "webhookUrl")]
        webhook_url: String,
    },
    Slack {
        #[serde(default, alias = "webhookUrl")]
        webhook_url: String,
    },
    Email {
        #[serde(default)]
        host: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        port: Option<u16>,
        #[serde(default)]
        username: String,
        #[serde(default)]
        password: String,
        #[serde(default)]
        from: String,
        #[serde(default)]
        to: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileScoring {
    pub enabled: bool,
    pub provider: String,
    pub interests: Vec<String>,
    #[serde(alias = "embeddingUrl", skip_serializing_if = "Option::is_none")]
    pub embedding_url: Option<String>,
    #[serde(
        alias = "embeddingModel",
        alias = "modelName",
        skip_serializing_if = "Option::is_none"
    )]
    pub embedding_model: Option<String>,
    #[serde(alias = "apiKey", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Parse config text. `hint_ext` picks the first format to try.
pub fn parse(s: &str, hint_ext: &str) -> Result<FileConfig> {
    let json_first = hint_ext == "json" || (hint_ext != "toml" && s.trim_start().starts_with('{'));
    if json_first {
        match serde_json::from_str(s) {
            Ok(v) => Ok(v),
            Err(json_err) => toml::from_str(s)
                .map_err(|_| anyhow!("config is neither valid JSON nor TOML: {json_err}")),
        }
    } else {
        match toml::from_str(s) {
            Ok(v) => Ok(v),
            Err(toml_err) => serde_json::from_str(s)
                .map_err(|_| anyhow!("config is neither valid TOML nor JSON: {toml_err}")),
        }
    }
}

/// Starter config written by `--create`.
pub fn sample() -> FileConfig {
    FileConfig {
        feed_parse_interval: Some("5m".into()),
        broadcast_interval: Some("10s".into()),
        apps: vec![FileApp {
            sink: FileSink::Stdout,
            sources: vec![
                FileSource {
                    url: "https://hnrss.org/newest.atom".into(),
                    ignore_before: Some("2020-04-20T00:00:00Z".into()),
                    must_include: vec!["linux".into(), "rust".into()],
                    must_exclude: vec!["windows".into()],
                    status_page: false,
                },
                FileSource {
                    url: "https://hnrss.org/newest.atom".into(),
                    ignore_before: Some("1h".into()),
                    ..FileSource::default()
                },
            ],
        }],
        ..FileConfig::default()
    }
}
