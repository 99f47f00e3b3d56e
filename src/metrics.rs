// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const PASSES_TOTAL: &str = "scrape_passes_total";
pub const SOURCES_TOTAL: &str = "scrape_sources_total";
pub const FETCH_ERRORS_TOTAL: &str = "scrape_fetch_errors_total";
pub const EXTRACTION_ERRORS_TOTAL: &str = "scrape_extraction_errors_total";
pub const CANDIDATES_TOTAL: &str = "scrape_candidates_total";
pub const DROPPED_TOTAL: &str = "scrape_dropped_total";
pub const UPSERTED_TOTAL: &str = "scrape_upserted_total";
pub const PASS_MS: &str = "scrape_pass_ms";
pub const LAST_RUN_TS: &str = "scrape_last_run_ts";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(PASSES_TOTAL, "Scrape passes started.");
        describe_counter!(SOURCES_TOTAL, "Sources processed across passes.");
        describe_counter!(
            FETCH_ERRORS_TOTAL,
            "Source pages that could not be fetched."
        );
        describe_counter!(
            EXTRACTION_ERRORS_TOTAL,
            "Completion calls that failed or returned no usable payload."
        );
        describe_counter!(CANDIDATES_TOTAL, "Candidates returned by extraction.");
        describe_counter!(DROPPED_TOTAL, "Candidates rejected by the normalizer.");
        describe_counter!(UPSERTED_TOTAL, "Records handed to the bulk upsert.");
        describe_histogram!(PASS_MS, "Scrape pass duration in milliseconds.");
        describe_gauge!(LAST_RUN_TS, "Unix ts when a scrape pass last finished.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process; later calls reuse it.
    pub fn init() -> anyhow::Result<Self> {
        static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();
        let handle = HANDLE
            .get_or_try_init(|| PrometheusBuilder::new().install_recorder())
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?
            .clone();
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
