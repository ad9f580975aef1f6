// src/orchestrator.rs
//! Per-application polling loop: fetch, filter, dedup, score, dispatch, evict.

use chrono::Utc;
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::dispatch::Dispatcher;
use crate::feed::Fetcher;
use crate::filter;
use crate::notify::{DynNotifier, Story};
use crate::score::{score_or_default, DynScorer, DEFAULT_SCORE_TIMEOUT};
use crate::shutdown::Shutdown;
use crate::source::Source;
use crate::store::DedupStore;

/// One sink and the sources feeding it.
#[derive(Clone)]
pub struct Application {
    pub notifier: DynNotifier,
    pub sources: Vec<Source>,
}

impl Application {
    pub fn new(notifier: DynNotifier, sources: Vec<Source>) -> Self {
        Self { notifier, sources }
    }

    /// Dedup namespace owned by this application.
    pub fn namespace(&self) -> &str {
        self.notifier.name()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Pause between cycles.
    pub feed_parse_interval: Duration,
    /// Pause after every dispatch attempt.
    pub broadcast_interval: Duration,
    pub score_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feed_parse_interval: Duration::from_secs(300),
            broadcast_interval: crate::dispatch::DEFAULT_BROADCAST_INTERVAL,
            score_timeout: DEFAULT_SCORE_TIMEOUT,
        }
    }
}

/// Counters for one pass over an application's sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub items: usize,
    pub filtered: usize,
    pub duplicates: usize,
    pub dispatched: usize,
    pub fetch_failures: usize,
    pub dispatch_failures: usize,
    pub evicted: usize,
    /// Shutdown arrived mid-cycle.
    pub interrupted: bool,
}

impl CycleReport {
    /// Eviction is only safe after a complete pass where every source was read
    /// and every new story delivered.
    pub fn is_clean(&self) -> bool {
        self.fetch_failures == 0 && self.dispatch_failures == 0 && !self.interrupted
    }
}

pub struct Orchestrator {
    store: Arc<DedupStore>,
    fetcher: Arc<dyn Fetcher>,
    scorer: Option<DynScorer>,
    dispatcher: Dispatcher,
    settings: Settings,
}

impl Orchestrator {
    pub fn new(
        store: Arc<DedupStore>,
        fetcher: Arc<dyn Fetcher>,
        scorer: Option<DynScorer>,
        settings: Settings,
    ) -> Self {
        crate::metrics::ensure_described();
        Self {
            store,
            fetcher,
            scorer,
            dispatcher: Dispatcher::new(settings.broadcast_interval),
            settings,
        }
    }

    /// One task per application; each stops at its next suspension point after shutdown.
    pub fn spawn(self: &Arc<Self>, apps: Vec<Application>, shutdown: Shutdown) -> Vec<JoinHandle<()>> {
        apps.into_iter()
            .map(|app| {
                let this = Arc::clone(self);
                let shutdown = shutdown.clone();
                let span = tracing::info_span!("app", sink = %app.namespace());
                tokio::spawn(async move { this.run_application(app, shutdown).await }.instrument(span))
            })
            .collect()
    }

    pub async fn run_application(&self, app: Application, mut shutdown: Shutdown) {
        tracing::info!(
            target: "orchestrator",
            sources = app.sources.len(),
            "application loop started"
        );
        loop {
            if shutdown.is_triggered() {
                break;
            }
            let report = self.run_cycle(&app, &mut shutdown).await;
            if report.interrupted {
                break;
            }
            if shutdown.sleep(self.settings.feed_parse_interval).await {
                break;
            }
        }
        tracing::info!(target: "orchestrator", "application loop stopped");
    }

    /// Single pass over every source of `app`.
    pub async fn run_cycle(&self, app: &Application, shutdown: &mut Shutdown) -> CycleReport {
        let started = Utc::now();
        let ns = app.namespace();
        let mut report = CycleReport::default();

        'sources: for source in &app.sources {
            if shutdown.is_triggered() {
                report.interrupted = true;
                break;
            }

            let items = match self.fetcher.fetch(&source.url).await {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(target: "orchestrator", error = ?e, source = %source.url, "fetch failed");
                    counter!("feed_fetch_errors_total", "sink" => ns.to_string()).increment(1);
                    report.fetch_failures += 1;
                    continue;
                }
            };
            counter!("feed_items_total", "sink" => ns.to_string()).increment(items.len() as u64);

            for item in items {
                report.items += 1;

                if !filter::matches(&item, source) {
                    report.filtered += 1;
                    counter!("feed_items_filtered_total", "sink" => ns.to_string()).increment(1);
                    continue;
                }

                let key = filter::identity(&item, source);
                if self.store.exists(ns, &key) {
                    report.duplicates += 1;
                    counter!("feed_items_duplicate_total", "sink" => ns.to_string()).increment(1);
                    continue;
                }

                let score = score_or_default(
                    self.scorer.as_deref(),
                    &item.title,
                    self.settings.score_timeout,
                )
                .await;

                let story = Story {
                    title: item.title,
                    url: item.link,
                    score: score.value,
                    reason: score.reason,
                };

                match self.dispatcher.dispatch(app.notifier.as_ref(), &story).await {
                    Ok(()) => {
                        self.store.insert(ns, &key);
                        report.dispatched += 1;
                        tracing::debug!(target: "orchestrator", title = %story.title, "story dispatched");
                    }
                    Err(e) => {
                        // Not recorded: retried next cycle.
                        report.dispatch_failures += 1;
                        tracing::warn!(target: "orchestrator", error = ?e, url = %story.url, "dispatch failed");
                    }
                }

                if self.dispatcher.throttle(shutdown).await {
                    report.interrupted = true;
                    break 'sources;
                }
            }
        }

        if report.is_clean() {
            report.evicted = self.store.evict_before(ns, started);
            if report.evicted > 0 {
                counter!("store_evicted_total", "sink" => ns.to_string())
                    .increment(report.evicted as u64);
            }
        }

        gauge!("feed_cycle_last_run_ts", "sink" => ns.to_string()).set(Utc::now().timestamp() as f64);
        tracing::info!(
            target: "orchestrator",
            items = report.items,
            filtered = report.filtered,
            duplicates = report.duplicates,
            dispatched = report.dispatched,
            fetch_failures = report.fetch_failures,
            dispatch_failures = report.dispatch_failures,
            evicted = report.evicted,
            "cycle finished"
        );
        report
    }
}
