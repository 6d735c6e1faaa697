//! Metric names, one-time descriptions, and the optional Prometheus listener.
//!
//! Without an installed recorder every `counter!`/`histogram!` call is a no-op,
//! so library users and tests pay nothing.

use std::net::SocketAddr;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

pub const CACHE_HITS: &str = "enrich_cache_hits_total";
pub const CACHE_MISSES: &str = "enrich_cache_misses_total";
pub const CACHE_EVICTIONS: &str = "enrich_cache_evictions_total";
pub const CACHE_SIZE: &str = "enrich_cache_size";
pub const FETCH_ERRORS: &str = "enrich_fetch_errors_total";
pub const FETCH_TIMEOUTS: &str = "enrich_fetch_timeouts_total";
pub const FETCH_MS: &str = "enrich_fetch_ms";
pub const PIPELINE_RUNS: &str = "enrich_pipeline_runs_total";
pub const PIPELINE_FAILURES: &str = "enrich_pipeline_failures_total";
pub const PIPELINE_MS: &str = "enrich_pipeline_ms";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(CACHE_HITS, "Cache reads that returned a live entry.");
        describe_counter!(CACHE_MISSES, "Cache reads that found nothing or an expired entry.");
        describe_counter!(
            CACHE_EVICTIONS,
            "Entries removed by LRU pressure, lazy expiry or cleanup."
        );
        describe_gauge!(CACHE_SIZE, "Live entries in the data cache.");
        describe_counter!(FETCH_ERRORS, "Provider calls that failed (timeouts included).");
        describe_counter!(FETCH_TIMEOUTS, "Provider calls that exceeded their timeout.");
        describe_histogram!(FETCH_MS, "Provider call latency in milliseconds.");
        describe_counter!(PIPELINE_RUNS, "Enrichment pipeline invocations.");
        describe_counter!(PIPELINE_FAILURES, "Enrichment runs that ended in a pipeline error.");
        describe_histogram!(PIPELINE_MS, "End-to-end enrichment time in milliseconds.");
    });
}

/// Install the Prometheus recorder and serve `/metrics` on `listen`.
/// Must be called from inside a Tokio runtime.
pub fn install_prometheus(listen: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(listen)
        .install()
        .map_err(|e| anyhow::anyhow!("prometheus: install recorder on {listen}: {e}"))?;
    ensure_metrics_described();
    tracing::info!(target: "metrics", %listen, "prometheus exporter listening");
    Ok(())
}
