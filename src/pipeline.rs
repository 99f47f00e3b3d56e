// src/pipeline.rs
//! # Scrape pass
//!
//! `Idle → FetchingSources → ProcessingSource[i] → Upserting → Done`, or
//! `Aborted` when the registry cannot be read.
//!
//! Each source runs Fetch → Extract → Normalize in isolation: an error or a
//! panic inside that sequence becomes that source's status and the pass moves
//! on. `last_scraped_at` is stamped after every attempt, successful or not.
//! Once all sources are done, every kept record goes into one bulk
//! insert-or-ignore. A failed bulk write fails the pass but does not undo the
//! timestamps already written.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use futures::{stream, FutureExt, StreamExt};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::ScrapeConfig;
use crate::error::Result;
use crate::extract::{Extractor, GatewayExtractor};
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::metrics as m;
use crate::normalize::Normalizer;
use crate::store::{ConferenceStore, PostgrestStore, SourceRegistry};
use crate::types::{Conference, Source, DEFAULT_TOPIC};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PassState {
    Idle,
    FetchingSources,
    ProcessingSource { index: usize, total: usize },
    Upserting,
    Done,
    Aborted,
}

/// What happened to one source during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Extracted {
        candidates: usize,
        kept: usize,
        dropped: usize,
    },
    FetchFailed {
        reason: String,
    },
    ExtractionFailed {
        reason: String,
    },
    Panicked,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source_id: String,
    pub name: String,
    pub status: SourceStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    /// Active sources considered.
    pub sources: usize,
    /// Normalized records handed to the upsert.
    pub scraped: usize,
    /// Newly written rows, when the store reports it.
    pub inserted: Option<usize>,
    pub conferences: Vec<Conference>,
    pub per_source: Vec<SourceReport>,
    pub state: PassState,
}

pub struct Scraper {
    registry: Arc<dyn SourceRegistry>,
    store: Arc<dyn ConferenceStore>,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn Extractor>,
    default_topic: String,
    reject_past_dates: bool,
    max_concurrency: usize,
}

impl Scraper {
    pub fn new(
        registry: Arc<dyn SourceRegistry>,
        store: Arc<dyn ConferenceStore>,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            registry,
            store,
            fetcher,
            extractor,
            default_topic: DEFAULT_TOPIC.to_string(),
            reject_past_dates: false,
            max_concurrency: 1,
        }
    }

    /// Wire the production collaborators (PostgREST, HTTP fetcher, completion
    /// gateway) from an already-loaded config.
    pub fn from_config(cfg: &ScrapeConfig) -> Result<Self> {
        cfg.validate()?;
        let store = Arc::new(PostgrestStore::new(&cfg.store_url, &cfg.store_key)?);
        let fetcher = Arc::new(HttpFetcher::new(&cfg.fetch.user_agent, cfg.fetch_timeout())?);
        let extractor = Arc::new(GatewayExtractor::from_config(cfg)?);
        Ok(Self::new(store.clone(), store, fetcher, extractor)
            .with_default_topic(cfg.default_topic.clone())
            .with_reject_past_dates(cfg.reject_past_dates)
            .with_max_concurrency(cfg.max_concurrency))
    }

    pub fn with_default_topic(mut self, topic: impl Into<String>) -> Self {
        self.default_topic = topic.into();
        self
    }

    pub fn with_reject_past_dates(mut self, on: bool) -> Self {
        self.reject_past_dates = on;
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn store(&self) -> Arc<dyn ConferenceStore> {
        self.store.clone()
    }

    fn normalizer(&self, today: NaiveDate) -> Normalizer {
        let n = Normalizer::new(self.default_topic.clone());
        if self.reject_past_dates {
            n.rejecting_before(today)
        } else {
            n
        }
    }

    /// Run one pass anchored on the current UTC date.
    pub async fn run_pass(&self) -> Result<PassReport> {
        self.run_pass_on(Utc::now().date_naive()).await
    }

    /// Run one pass with `today` as the reference date given to the model.
    pub async fn run_pass_on(&self, today: NaiveDate) -> Result<PassReport> {
        m::ensure_metrics_described();
        counter!(m::PASSES_TOTAL).increment(1);
        let t0 = Instant::now();

        let mut state = PassState::Idle;
        transition(&mut state, PassState::FetchingSources);

        let sources = match self.registry.list_active().await {
            Ok(v) => v,
            Err(e) => {
                transition(&mut state, PassState::Aborted);
                error!(error = %e, "cannot list active sources, aborting pass");
                return Err(e);
            }
        };
        info!(count = sources.len(), "found active sources");

        let normalizer = self.normalizer(today);
        let total = sources.len();
        let jobs: Vec<_> = sources
            .iter()
            .enumerate()
            .map(|(index, source)| self.process_source(index, total, source, today, &normalizer))
            .collect();
        // buffered() keeps source order; with a limit of 1 it is a plain sequential loop
        let results: Vec<(SourceReport, Vec<Conference>)> = stream::iter(jobs)
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut per_source = Vec::with_capacity(results.len());
        let mut conferences = Vec::new();
        for (report, mut kept) in results {
            per_source.push(report);
            conferences.append(&mut kept);
        }

        transition(&mut state, PassState::Upserting);
        let inserted = if conferences.is_empty() {
            Some(0)
        } else {
            info!(count = conferences.len(), "upserting conferences");
            match self.store.upsert_ignore_duplicates(&conferences).await {
                Ok(n) => {
                    counter!(m::UPSERTED_TOTAL).increment(conferences.len() as u64);
                    n
                }
                Err(e) => {
                    // Timestamps stamped above stay as they are.
                    transition(&mut state, PassState::Aborted);
                    error!(error = %e, count = conferences.len(), "bulk upsert failed");
                    return Err(e);
                }
            }
        };

        transition(&mut state, PassState::Done);
        histogram!(m::PASS_MS).record(t0.elapsed().as_secs_f64() * 1_000.0);
        gauge!(m::LAST_RUN_TS).set(Utc::now().timestamp() as f64);
        info!(
            sources = total,
            scraped = conferences.len(),
            inserted = ?inserted,
            "scrape pass completed"
        );

        Ok(PassReport {
            sources: total,
            scraped: conferences.len(),
            inserted,
            conferences,
            per_source,
            state,
        })
    }

    /// Fetch → Extract → Normalize for one source, then stamp `last_scraped_at`.
    async fn process_source(
        &self,
        index: usize,
        total: usize,
        source: &Source,
        today: NaiveDate,
        normalizer: &Normalizer,
    ) -> (SourceReport, Vec<Conference>) {
        let state = PassState::ProcessingSource { index, total };
        debug!(state = ?state, source = %source.name, "pass state");
        counter!(m::SOURCES_TOTAL).increment(1);

        let attempt = AssertUnwindSafe(self.fetch_extract_normalize(source, today, normalizer))
            .catch_unwind()
            .await;
        let (status, kept) = attempt.unwrap_or_else(|_| {
            error!(source = %source.name, url = %source.url, "source processing panicked");
            (SourceStatus::Panicked, Vec::new())
        });

        if let Err(e) = self.registry.mark_scraped(&source.id, Utc::now()).await {
            warn!(source = %source.name, error = %e, "failed to update last_scraped_at");
        }

        let report = SourceReport {
            source_id: source.id.clone(),
            name: source.name.clone(),
            status,
        };
        (report, kept)
    }

    async fn fetch_extract_normalize(
        &self,
        source: &Source,
        today: NaiveDate,
        normalizer: &Normalizer,
    ) -> (SourceStatus, Vec<Conference>) {
        info!(source = %source.name, url = %source.url, "processing source");

        let html = match self.fetcher.fetch(&source.url).await {
            Ok(h) => h,
            Err(e) => {
                warn!(source = %source.name, url = %source.url, error = %e, "fetch failed, skipping source");
                counter!(m::FETCH_ERRORS_TOTAL).increment(1);
                return (
                    SourceStatus::FetchFailed {
                        reason: e.to_string(),
                    },
                    Vec::new(),
                );
            }
        };
        debug!(source = %source.name, bytes = html.len(), "fetched page");

        let raws = match self.extractor.extract(&html, today).await {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    source = %source.name,
                    provider = self.extractor.name(),
                    error = %e,
                    "extraction failed, no candidates from source"
                );
                counter!(m::EXTRACTION_ERRORS_TOTAL).increment(1);
                return (
                    SourceStatus::ExtractionFailed {
                        reason: e.to_string(),
                    },
                    Vec::new(),
                );
            }
        };

        let candidates = raws.len();
        counter!(m::CANDIDATES_TOTAL).increment(candidates as u64);
        let outcome = normalizer.normalize_all(source, raws);
        counter!(m::DROPPED_TOTAL).increment(outcome.dropped.len() as u64);
        info!(
            source = %source.name,
            candidates,
            kept = outcome.kept.len(),
            "extracted conferences"
        );

        (
            SourceStatus::Extracted {
                candidates,
                kept: outcome.kept.len(),
                dropped: outcome.dropped.len(),
            },
            outcome.kept,
        )
    }
}

fn transition(state: &mut PassState, next: PassState) {
    debug!(from = ?*state, to = ?next, "pass state");
    *state = next;
}
