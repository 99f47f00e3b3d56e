// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::pipeline::Scraper;

/// Spawn a timer that runs one pass per tick; the first tick fires immediately.
/// Passes never overlap within this task: a slow pass delays the next tick.
pub fn spawn_scheduler(scraper: Arc<Scraper>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match scraper.run_pass().await {
                Ok(report) => tracing::info!(
                    target: "scheduler",
                    sources = report.sources,
                    scraped = report.scraped,
                    "scheduled scrape tick"
                ),
                Err(e) => tracing::error!(target: "scheduler", error = %e, "scheduled scrape failed"),
            }
        }
    })
}
