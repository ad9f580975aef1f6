//! feed-sentry binary entrypoint.
//! Loads config, restores the dedup store, runs one polling loop per
//! application and snapshots the store on the way out.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feed_sentry::config::{self, Config};
use feed_sentry::feed::HttpFetcher;
use feed_sentry::notify::build_notifier;
use feed_sentry::orchestrator::{Application, Orchestrator};
use feed_sentry::shutdown;
use feed_sentry::store::{persist, DedupStore};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const SNAPSHOT_ATTEMPTS: u32 = 3;
const SNAPSHOT_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(name = "feed-sentry", version, about = "Feed polling and notification daemon")]
struct Cli {
    /// Path to config file [default: ~/.config/feed-sentry/config.toml]
    #[arg(long, env = "FEED_SENTRY_CONFIG")]
    config: Option<PathBuf>,

    /// Path to storage file [default: config `storage_file`, else ~/.config/feed-sentry/data.json]
    #[arg(long, env = "FEED_SENTRY_STORAGE")]
    storage: Option<PathBuf>,

    /// Write a sample config file and exit
    #[arg(long)]
    create: bool,
}

/// Compact logs by default, JSON lines with `LOG_FORMAT=json`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feed_sentry=info,warn"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().compact().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "fatal");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(config::default_config_path);

    if cli.create {
        config::write_sample(&config_path)?;
        tracing::info!(path = %config_path.display(), "created sample config file");
        return Ok(());
    }

    let cfg: Config = config::load_from(&config_path)?;
    let storage_path = config::storage_path(cli.storage, &cfg);

    if let Some(addr) = cfg.metrics_addr {
        feed_sentry::metrics::install_exporter(addr)?;
    }

    let store = Arc::new(DedupStore::new());
    let restored = persist::restore_from_file(&store, &storage_path, &cfg.default_namespace())
        .with_context(|| format!("restoring store from {}", storage_path.display()))?;
    tracing::info!(path = %storage_path.display(), records = restored, "store restored");

    let scorer = cfg.scoring.clone().build().await.context("initializing scorer")?;
    if let Some(s) = &scorer {
        tracing::info!(scorer = s.name(), "relevance scoring enabled");
    }

    let mut apps = Vec::with_capacity(cfg.apps.len());
    for app in &cfg.apps {
        let notifier = build_notifier(&app.sink)
            .with_context(|| format!("building sink {}", app.sink.name()))?;
        apps.push(Application::new(notifier, app.sources.clone()));
    }

    let fetcher = Arc::new(HttpFetcher::new(FETCH_TIMEOUT)?);
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        fetcher,
        scorer.clone(),
        cfg.settings(),
    ));

    let (trigger, shutdown_rx) = shutdown::channel();
    let mut tasks = orchestrator.spawn(apps, shutdown_rx.clone());
    if let Some(every) = cfg.persist_interval {
        tasks.push(persist::spawn_periodic(
            store.clone(),
            storage_path.clone(),
            every,
            shutdown_rx,
        ));
    }
    tracing::info!(applications = cfg.apps.len(), "feed-sentry running");

    wait_for_signal().await;
    tracing::info!("shutdown requested");
    trigger.trigger();

    for t in tasks {
        if let Err(e) = t.await {
            tracing::warn!(error = ?e, "task ended abnormally");
        }
    }

    if let Some(s) = &scorer {
        if let Err(e) = s.close().await {
            tracing::warn!(error = ?e, scorer = s.name(), "closing scorer failed");
        }
    }

    let saved = persist::save_store_with_retry(&store, &storage_path, SNAPSHOT_ATTEMPTS, SNAPSHOT_PAUSE)
        .await
        .with_context(|| format!("saving store to {}", storage_path.display()))?;
    tracing::info!(path = %storage_path.display(), records = saved, "store saved");
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!(error = ?e, "SIGTERM handler unavailable"),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = ?e, "ctrl-c handler failed");
    }
}
