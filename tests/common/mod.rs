// tests/common/mod.rs
// Stub collaborators shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use conference_scraper::error::{Result, ScrapeError};
use conference_scraper::extract::Extractor;
use conference_scraper::fetch::PageFetcher;
use conference_scraper::store::MemoryStore;
use conference_scraper::{RawCandidate, Scraper, Source};

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

pub fn source(id: &str, name: &str, url: &str) -> Source {
    Source {
        id: id.into(),
        name: name.into(),
        url: url.into(),
        is_active: true,
        last_scraped_at: None,
    }
}

pub fn candidate(title: &str, date: &str) -> RawCandidate {
    RawCandidate {
        title: Some(title.into()),
        date: Some(date.into()),
        location: Some("Санкт-Петербург".into()),
        description: Some("Международная научно-практическая конференция".into()),
        format: Some("Очно".into()),
        topic: Some("Железнодорожный транспорт".into()),
        ..Default::default()
    }
}

/// url -> page body, or an error reason. Unknown urls answer 404.
#[derive(Default)]
pub struct StubFetcher {
    pages: HashMap<String, std::result::Result<String, String>>,
    pub calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.into(), Ok(html.into()));
        self
    }

    pub fn failing(mut self, url: &str, reason: &str) -> Self {
        self.pages.insert(url.into(), Err(reason.into()));
        self
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(Ok(html)) => Ok(html.clone()),
            Some(Err(reason)) => Err(ScrapeError::Fetch {
                url: url.into(),
                reason: reason.clone(),
            }),
            None => Err(ScrapeError::Fetch {
                url: url.into(),
                reason: "HTTP 404".into(),
            }),
        }
    }
}

/// page body -> candidates, or an error reason. Unknown bodies yield nothing.
/// A body of "PANIC" makes the extractor panic.
#[derive(Default)]
pub struct StubExtractor {
    answers: HashMap<String, std::result::Result<Vec<RawCandidate>, String>>,
}

impl StubExtractor {
    pub fn answer(mut self, html: &str, candidates: Vec<RawCandidate>) -> Self {
        self.answers.insert(html.into(), Ok(candidates));
        self
    }

    pub fn failing(mut self, html: &str, reason: &str) -> Self {
        self.answers.insert(html.into(), Err(reason.into()));
        self
    }
}

#[async_trait]
impl Extractor for StubExtractor {
    async fn extract(&self, html: &str, _today: NaiveDate) -> Result<Vec<RawCandidate>> {
        if html == "PANIC" {
            panic!("extractor blew up");
        }
        match self.answers.get(html) {
            Some(Ok(v)) => Ok(v.clone()),
            Some(Err(reason)) => Err(ScrapeError::Extraction(reason.clone())),
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

pub fn scraper(
    store: &Arc<MemoryStore>,
    fetcher: StubFetcher,
    extractor: StubExtractor,
) -> Scraper {
    Scraper::new(
        store.clone(),
        store.clone(),
        Arc::new(fetcher),
        Arc::new(extractor),
    )
}
