// src/config/mod.rs
//! Load, resolve and validate the runtime configuration.

pub mod duration;
pub mod file;

pub use duration::parse_duration;
pub use file::{FileApp, FileConfig, FileScoring, FileSink, FileSource};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dispatch::DEFAULT_BROADCAST_INTERVAL;
use crate::notify::hashed_name;
use crate::orchestrator::Settings;
use crate::score::{EmbeddingConfig, KeywordConfig, ScoringMode, DEFAULT_SCORE_TIMEOUT};
use crate::source::Source;

/// Placeholder meaning "read this secret from the environment".
pub const ENV_PLACEHOLDER: &str = "ENV";

const DEFAULT_FEED_PARSE_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_EMBEDDING_URL: &str = "http://localhost:11434/v1/embeddings";
const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

#[derive(Debug, Clone, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

/// Sink with secrets resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkConfig {
    Stdout,
    Telegram { bot_token: String, chat_id: String },
    Discord { webhook_url: String },
    Slack { webhook_url: String },
    Email(SmtpConfig),
}

impl SinkConfig {
    /// Same value the built notifier reports from `name()`.
    pub fn name(&self) -> String {
        match self {
            SinkConfig::Stdout => "stdout".to_string(),
            SinkConfig::Telegram { chat_id, .. } => format!("telegram-{chat_id}"),
            SinkConfig::Discord { webhook_url } => hashed_name("discord", webhook_url),
            SinkConfig::Slack { webhook_url } => hashed_name("slack", webhook_url),
            SinkConfig::Email(smtp) => crate::notify::email::sink_name(smtp),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub sink: SinkConfig,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub feed_parse_interval: Duration,
    pub broadcast_interval: Duration,
    pub storage_file: Option<PathBuf>,
    pub persist_interval: Option<Duration>,
    pub metrics_addr: Option<SocketAddr>,
    pub scoring: ScoringMode,
    pub apps: Vec<AppConfig>,
}

impl Config {
    pub fn settings(&self) -> Settings {
        Settings {
            feed_parse_interval: self.feed_parse_interval,
            broadcast_interval: self.broadcast_interval,
            score_timeout: DEFAULT_SCORE_TIMEOUT,
        }
    }

    /// Namespace that legacy flat store files are loaded into.
    pub fn default_namespace(&self) -> String {
        self.apps
            .first()
            .map(|a| a.sink.name())
            .unwrap_or_else(|| "stdout".to_string())
    }
}

fn config_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("feed-sentry")
}

pub fn default_config_path() -> PathBuf {
    config_home().join("config.toml")
}

pub fn default_storage_path() -> PathBuf {
    config_home().join("data.json")
}

/// Storage precedence: explicit path (flag or env) > config file > default.
pub fn storage_path(explicit: Option<PathBuf>, cfg: &Config) -> PathBuf {
    explicit
        .or_else(|| cfg.storage_file.clone())
        .unwrap_or_else(default_storage_path)
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Load and resolve a config file. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let raw = file::parse(&content, &extension(path))
        .with_context(|| format!("parsing config {}", path.display()))?;
    raw.resolve(Utc::now())
        .with_context(|| format!("invalid config {}", path.display()))
}

/// Write the starter config. Refuses to overwrite an existing file.
pub fn write_sample(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let sample = file::sample();
    let text = if extension(path) == "json" {
        serde_json::to_string_pretty(&sample)?
    } else {
        toml::to_string_pretty(&sample)?
    };
    fs::write(path, text).with_context(|| format!("writing sample config to {}", path.display()))
}

/// `"ENV"` means: read `var` from the environment.
fn secret(value: &str, var: &str) -> Result<String> {
    let v = value.trim();
    if v.eq_ignore_ascii_case(ENV_PLACEHOLDER) {
        std::env::var(var).map_err(|_| anyhow!("{var} is not set"))
    } else {
        Ok(v.to_string())
    }
}

fn required(value: String, what: &str) -> Result<String> {
    if value.trim().is_empty() {
        bail!("{what} is required");
    }
    Ok(value)
}

/// Absolute RFC 3339 time, or a duration meaning "that long before `now`".
pub fn resolve_ignore_before(raw: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(t.with_timezone(&Utc)));
    }
    if let Ok(d) = parse_duration(raw) {
        let d = chrono::Duration::from_std(d).context("ignore_before duration too large")?;
        let cutoff = now
            .checked_sub_signed(d)
            .with_context(|| format!("ignore_before {raw:?} reaches past the representable range"))?;
        return Ok(Some(cutoff));
    }
    if let Some(t) = crate::feed::timeparse::parse_utc(raw) {
        return Ok(Some(t));
    }
    bail!("ignore_before {raw:?} is neither a timestamp nor a duration")
}

fn resolve_source(raw: FileSource, now: DateTime<Utc>) -> Result<Source> {
    let url = raw.url.trim().to_string();
    let parsed = reqwest::Url::parse(&url).with_context(|| format!("invalid source url {url:?}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("source url {url:?} must be http or https");
    }

    let mut source = Source::new(url.clone())
        .must_include(&raw.must_include)
        .must_exclude(&raw.must_exclude)
        .status_page(raw.status_page);
    if let Some(ib) = raw.ignore_before.as_deref() {
        let cutoff = resolve_ignore_before(ib, now).with_context(|| format!("source {url:?}"))?;
        source.ignore_before = cutoff;
    }
    Ok(source)
}

fn resolve_sink(raw: FileSink) -> Result<SinkConfig> {
    Ok(match raw {
        FileSink::Stdout => SinkConfig::Stdout,
        FileSink::Telegram { bot_token, chat_id } => SinkConfig::Telegram {
            bot_token: required(secret(&bot_token, "TELEGRAM_BOT_TOKEN")?, "telegram bot_token")?,
            chat_id: required(chat_id.trim().to_string(), "telegram chat_id")?,
        },
        FileSink::Discord { webhook_url } => SinkConfig::Discord {
            webhook_url: required(secret(&webhook_url, "DISCORD_WEBHOOK_URL")?, "discord webhook_url")?,
        },
        FileSink::Slack { webhook_url } => SinkConfig::Slack {
            webhook_url: required(secret(&webhook_url, "SLACK_WEBHOOK_URL")?, "slack webhook_url")?,
        },
        FileSink::Email {
            host,
            port,
            username,
            password,
            from,
            to,
        } => SinkConfig::Email(SmtpConfig {
            host: required(host, "email host")?,
            port,
            username,
            password: secret(&password, "SMTP_PASS")?,
            from: required(from, "email from")?,
            to: required(to, "email to")?,
        }),
    })
}

fn resolve_scoring(raw: Option<FileScoring>) -> Result<ScoringMode> {
    let Some(raw) = raw.filter(|s| s.enabled) else {
        return Ok(ScoringMode::NoScoring);
    };
    let interests: Vec<String> = raw
        .interests
        .iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();
    if interests.is_empty() {
        bail!("scoring is enabled but no interests are configured");
    }

    match raw.provider.trim().to_ascii_lowercase().as_str() {
        "" | "keyword" => Ok(ScoringMode::Keyword(KeywordConfig { interests })),
        "embedding" => {
            let api_key = match raw.api_key.as_deref() {
                Some(k) => Some(secret(k, "EMBEDDING_API_KEY")?).filter(|k| !k.is_empty()),
                None => None,
            };
            Ok(ScoringMode::Embedding(EmbeddingConfig {
                interests,
                url: raw
                    .embedding_url
                    .filter(|u| !u.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_URL.to_string()),
                model: raw
                    .embedding_model
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
                api_key,
            }))
        }
        other => bail!("unknown scoring provider {other:?} (expected keyword or embedding)"),
    }
}

fn interval(raw: Option<&str>, what: &str) -> Result<Option<Duration>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_duration(s)
            .map(Some)
            .with_context(|| format!("invalid {what}")),
    }
}

impl FileConfig {
    /// Resolve relative times against `now`, read `ENV` secrets and validate.
    pub fn resolve(self, now: DateTime<Utc>) -> Result<Config> {
        let feed_parse_interval = interval(self.feed_parse_interval.as_deref(), "feed_parse_interval")?
            .unwrap_or(DEFAULT_FEED_PARSE_INTERVAL);
        if feed_parse_interval.is_zero() {
            bail!("feed_parse_interval must be greater than zero");
        }
        let broadcast_interval = interval(self.broadcast_interval.as_deref(), "broadcast_interval")?
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_BROADCAST_INTERVAL);
        let persist_interval = interval(self.persist_interval.as_deref(), "persist_interval")?
            .filter(|d| !d.is_zero());
        let metrics_addr = match self.metrics_addr.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(a) => Some(
                a.parse::<SocketAddr>()
                    .with_context(|| format!("invalid metrics_addr {a:?}"))?,
            ),
        };

        let mut raw_apps = self.apps;
        let legacy = !self.sources.is_empty() || self.broadcast_type.is_some();
        if legacy {
            if !raw_apps.is_empty() {
                bail!("use either [[apps]] or top-level sources, not both");
            }
            let sink = match self.broadcast_type.as_deref().map(str::trim) {
                Some(t) if t.eq_ignore_ascii_case("telegram") => FileSink::Telegram {
                    bot_token: self.telegram_bot_token.unwrap_or_default(),
                    chat_id: self.telegram_chat_id.unwrap_or_default(),
                },
                _ => FileSink::Stdout,
            };
            raw_apps.push(FileApp {
                sink,
                sources: self.sources,
            });
        }

        if raw_apps.is_empty() {
            bail!("at least one application must be configured");
        }

        let mut names = HashSet::new();
        let mut apps = Vec::with_capacity(raw_apps.len());
        for (i, app) in raw_apps.into_iter().enumerate() {
            let sink = resolve_sink(app.sink).with_context(|| format!("application #{}", i + 1))?;
            let name = sink.name();
            if !names.insert(name.clone()) {
                bail!("sink {name:?} is used by more than one application");
            }
            if app.sources.is_empty() {
                bail!("application {name:?} has no sources");
            }
            let sources = app
                .sources
                .into_iter()
                .map(|s| resolve_source(s, now))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("application {name:?}"))?;
            apps.push(AppConfig { sink, sources });
        }

        Ok(Config {
            feed_parse_interval,
            broadcast_interval,
            storage_file: self.storage_file.filter(|p| !p.as_os_str().is_empty()),
            persist_interval,
            metrics_addr,
            scoring: resolve_scoring(self.scoring)?,
            apps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::env;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn one_source(url: &str) -> Vec<FileSource> {
        vec![FileSource {
            url: url.into(),
            ..FileSource::default()
        }]
    }

    fn app(sink: FileSink) -> FileApp {
        FileApp {
            sink,
            sources: one_source("https://a.test/feed"),
        }
    }

    #[test]
    fn ignore_before_accepts_time_or_duration() {
        assert_eq!(
            resolve_ignore_before("2020-04-20T00:00:00Z", now()).unwrap(),
            Some(Utc.with_ymd_and_hms(2020, 4, 20, 0, 0, 0).unwrap())
        );
        assert_eq!(
            resolve_ignore_before("1h", now()).unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap())
        );
        assert_eq!(
            resolve_ignore_before("2020-04-20 00:00:00 +0000 UTC", now()).unwrap(),
            Some(Utc.with_ymd_and_hms(2020, 4, 20, 0, 0, 0).unwrap())
        );
        assert_eq!(resolve_ignore_before("", now()).unwrap(), None);
        assert!(resolve_ignore_before("yesterday-ish", now()).is_err());
    }

    #[test]
    fn ignore_before_out_of_range_is_an_error() {
        let err = resolve_ignore_before("5000000000h", now()).unwrap_err();
        assert!(err.to_string().contains("representable range"));
    }

    #[test]
    fn defaults_and_keyword_normalization() {
        let raw = FileConfig {
            apps: vec![FileApp {
                sink: FileSink::Stdout,
                sources: vec![FileSource {
                    url: "https://a.test/feed".into(),
                    must_include: vec![" Linux ".into(), "".into()],
                    must_exclude: vec!["WINDOWS".into()],
                    ..FileSource::default()
                }],
            }],
            ..FileConfig::default()
        };
        let cfg = raw.resolve(now()).unwrap();
        assert_eq!(cfg.feed_parse_interval, DEFAULT_FEED_PARSE_INTERVAL);
        assert_eq!(cfg.broadcast_interval, DEFAULT_BROADCAST_INTERVAL);
        assert_eq!(cfg.scoring, ScoringMode::NoScoring);
        assert_eq!(cfg.apps[0].sources[0].must_include, vec!["linux"]);
        assert_eq!(cfg.apps[0].sources[0].must_exclude, vec!["windows"]);
        assert_eq!(cfg.default_namespace(), "stdout");
    }

    #[test]
    fn zero_broadcast_interval_uses_default() {
        let raw = FileConfig {
            broadcast_interval: Some("0".into()),
            apps: vec![app(FileSink::Stdout)],
            ..FileConfig::default()
        };
        assert_eq!(raw.resolve(now()).unwrap().broadcast_interval, DEFAULT_BROADCAST_INTERVAL);
    }

    #[test]
    fn validation_errors() {
        // no apps
        assert!(FileConfig::default().resolve(now()).is_err());

        // app without sources
        let raw = FileConfig {
            apps: vec![FileApp {
                sink: FileSink::Stdout,
                sources: vec![],
            }],
            ..FileConfig::default()
        };
        assert!(raw.resolve(now()).is_err());

        // bad url
        let raw = FileConfig {
            apps: vec![FileApp {
                sink: FileSink::Stdout,
                sources: one_source("not a url"),
            }],
            ..FileConfig::default()
        };
        assert!(raw.resolve(now()).is_err());

        // bad interval
        let raw = FileConfig {
            feed_parse_interval: Some("soon".into()),
            apps: vec![app(FileSink::Stdout)],
            ..FileConfig::default()
        };
        assert!(raw.resolve(now()).is_err());

        // duplicate sinks share a namespace
        let raw = FileConfig {
            apps: vec![app(FileSink::Stdout), app(FileSink::Stdout)],
            ..FileConfig::default()
        };
        let err = raw.resolve(now()).unwrap_err();
        assert!(format!("{err:#}").contains("more than one application"));

        // missing telegram chat id
        let raw = FileConfig {
            apps: vec![app(FileSink::Telegram {
                bot_token: "tok".into(),
                chat_id: "".into(),
            })],
            ..FileConfig::default()
        };
        assert!(raw.resolve(now()).is_err());

        // scoring without interests
        let raw = FileConfig {
            apps: vec![app(FileSink::Stdout)],
            scoring: Some(FileScoring {
                enabled: true,
                ..FileScoring::default()
            }),
            ..FileConfig::default()
        };
        assert!(raw.resolve(now()).is_err());
    }

    #[test]
    fn legacy_single_app_is_converted() {
        let raw = FileConfig {
            broadcast_type: Some("TELEGRAM".into()),
            telegram_bot_token: Some("tok".into()),
            telegram_chat_id: Some("99".into()),
            sources: one_source("https://a.test/feed"),
            ..FileConfig::default()
        };
        let cfg = raw.resolve(now()).unwrap();
        assert_eq!(cfg.apps.len(), 1);
        assert_eq!(cfg.default_namespace(), "telegram-99");
    }

    #[test]
    fn scoring_modes_resolve() {
        let raw = FileConfig {
            apps: vec![app(FileSink::Stdout)],
            scoring: Some(FileScoring {
                enabled: true,
                provider: "embedding".into(),
                interests: vec!["rust".into(), " ".into()],
                ..FileScoring::default()
            }),
            ..FileConfig::default()
        };
        match raw.resolve(now()).unwrap().scoring {
            ScoringMode::Embedding(e) => {
                assert_eq!(e.interests, vec!["rust"]);
                assert_eq!(e.url, DEFAULT_EMBEDDING_URL);
                assert_eq!(e.model, DEFAULT_EMBEDDING_MODEL);
                assert_eq!(e.api_key, None);
            }
            other => panic!("unexpected mode {other:?}"),
        }

        let raw = FileConfig {
            apps: vec![app(FileSink::Stdout)],
            scoring: Some(FileScoring {
                enabled: false,
                provider: "embedding".into(),
                ..FileScoring::default()
            }),
            ..FileConfig::default()
        };
        assert_eq!(raw.resolve(now()).unwrap().scoring, ScoringMode::NoScoring);
    }

    #[serial_test::serial]
    #[test]
    fn env_placeholder_reads_secret() {
        env::set_var("SLACK_WEBHOOK_URL", "https://hooks.slack.test/T0/B0/x");
        let raw = FileConfig {
            apps: vec![app(FileSink::Slack {
                webhook_url: "ENV".into(),
            })],
            ..FileConfig::default()
        };
        let cfg = raw.resolve(now()).unwrap();
        assert_eq!(
            cfg.apps[0].sink,
            SinkConfig::Slack {
                webhook_url: "https://hooks.slack.test/T0/B0/x".into()
            }
        );

        env::remove_var("SLACK_WEBHOOK_URL");
        let raw = FileConfig {
            apps: vec![app(FileSink::Slack {
                webhook_url: "ENV".into(),
            })],
            ..FileConfig::default()
        };
        assert!(raw.resolve(now()).is_err());
    }

    #[test]
    fn sample_is_loadable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        write_sample(&path).unwrap();
        let cfg = load_from(&path).unwrap();
        assert_eq!(cfg.apps.len(), 1);
        assert_eq!(cfg.apps[0].sources.len(), 2);
        assert_eq!(cfg.feed_parse_interval, Duration::from_secs(300));
        assert!(write_sample(&path).is_err(), "must not overwrite");

        let json = tmp.path().join("config.json");
        write_sample(&json).unwrap();
        assert_eq!(load_from(&json).unwrap().apps.len(), 1);
    }

    #[test]
    fn storage_path_precedence() {
        let mut cfg = FileConfig {
            apps: vec![app(FileSink::Stdout)],
            ..FileConfig::default()
        }
        .resolve(now())
        .unwrap();
        assert_eq!(storage_path(None, &cfg), default_storage_path());
        cfg.storage_file = Some(PathBuf::from("from-config.json"));
        assert_eq!(storage_path(None, &cfg), PathBuf::from("from-config.json"));
        assert_eq!(
            storage_path(Some(PathBuf::from("flag.json")), &cfg),
            PathBuf::from("flag.json")
        );
    }
}
