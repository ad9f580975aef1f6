// src/metrics.rs
use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_fetch_errors_total", "Feed fetch/parse failures.");
        describe_counter!("feed_items_total", "Items returned by fetched feeds.");
        describe_counter!(
            "feed_items_filtered_total",
            "Items rejected by source rules."
        );
        describe_counter!(
            "feed_items_duplicate_total",
            "Items skipped because they were already delivered."
        );
        describe_counter!("feed_dispatch_total", "Stories delivered to a sink.");
        describe_counter!("feed_dispatch_errors_total", "Failed sink deliveries.");
        describe_counter!(
            "feed_score_errors_total",
            "Scoring calls that failed or timed out."
        );
        describe_counter!("store_evicted_total", "Dedup records removed by eviction.");
        describe_gauge!(
            "feed_cycle_last_run_ts",
            "Unix ts when an application last finished a cycle."
        );
        describe_histogram!("feed_fetch_ms", "Feed fetch + parse time in milliseconds.");
    });
}

/// Install the global Prometheus recorder with its own `/metrics` HTTP listener.
/// Must be called from within a tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("installing prometheus exporter on {addr}"))?;
    ensure_described();
    tracing::info!(%addr, "metrics listener started");
    Ok(())
}
