// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod scheduler;
pub mod store;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::ScrapeConfig;
pub use crate::error::ScrapeError;
pub use crate::pipeline::{PassReport, Scraper};
pub use crate::types::{Conference, ConferenceFormat, RawCandidate, Source};

use std::sync::Arc;

use axum::Router;
use tracing::info;

/// Build the full app (router + metrics, optional scheduler) from config.
/// Used by the Shuttle entrypoint; tests build routers directly.
pub fn app(cfg: &ScrapeConfig) -> anyhow::Result<Router> {
    let scraper = Arc::new(Scraper::from_config(cfg)?);
    let metrics = metrics::Metrics::init()?;

    if let Some(every) = cfg.schedule_interval() {
        info!(interval_secs = every.as_secs(), "starting scrape scheduler");
        scheduler::spawn_scheduler(scraper.clone(), every);
    }

    Ok(api::router_with_metrics(AppState::new(scraper), &metrics))
}
