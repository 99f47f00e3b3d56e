// src/store/memory.rs
use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{ConferenceStore, SourceRegistry};
use crate::error::{Result, ScrapeError};
use crate::types::{Conference, ConferenceKey, Source};

/// In-process registry + conference table with the same first-write-wins
/// semantics as the remote store. Used for local runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sources: Mutex<Vec<Source>>,
    conferences: Mutex<Vec<Conference>>,
    // test knobs
    fail_registry: Mutex<Option<String>>,
    fail_upsert: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(sources: Vec<Source>) -> Self {
        let s = Self::default();
        *s.sources.lock().expect("sources mutex poisoned") = sources;
        s
    }

    /// Make `list_active` fail with the given message.
    pub fn fail_registry_with(&self, msg: impl Into<String>) {
        *self.fail_registry.lock().expect("flag mutex poisoned") = Some(msg.into());
    }

    /// Make `upsert_ignore_duplicates` fail with the given message.
    pub fn fail_upsert_with(&self, msg: impl Into<String>) {
        *self.fail_upsert.lock().expect("flag mutex poisoned") = Some(msg.into());
    }

    pub fn sources(&self) -> Vec<Source> {
        self.sources.lock().expect("sources mutex poisoned").clone()
    }

    pub fn source(&self, id: &str) -> Option<Source> {
        self.sources().into_iter().find(|s| s.id == id)
    }

    pub fn conferences(&self) -> Vec<Conference> {
        self.conferences
            .lock()
            .expect("conferences mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl SourceRegistry for MemoryStore {
    async fn list_active(&self) -> Result<Vec<Source>> {
        if let Some(msg) = self.fail_registry.lock().expect("flag mutex poisoned").clone() {
            return Err(ScrapeError::Registry(msg));
        }
        let v = self.sources.lock().expect("sources mutex poisoned");
        Ok(v.iter().filter(|s| s.is_active).cloned().collect())
    }

    async fn mark_scraped(&self, source_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut v = self.sources.lock().expect("sources mutex poisoned");
        // Unknown ids match nothing, as an UPDATE ... WHERE id = ? would.
        if let Some(s) = v.iter_mut().find(|s| s.id == source_id) {
            s.last_scraped_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl ConferenceStore for MemoryStore {
    async fn upsert_ignore_duplicates(&self, records: &[Conference]) -> Result<Option<usize>> {
        if let Some(msg) = self.fail_upsert.lock().expect("flag mutex poisoned").clone() {
            return Err(ScrapeError::Persistence(msg));
        }
        let mut table = self.conferences.lock().expect("conferences mutex poisoned");
        let mut seen: HashSet<ConferenceKey> = table.iter().map(Conference::key).collect();
        let mut inserted = 0usize;
        for rec in records {
            if seen.insert(rec.key()) {
                table.push(rec.clone());
                inserted += 1;
            }
        }
        Ok(Some(inserted))
    }

    async fn upcoming(&self, from: NaiveDate) -> Result<Vec<Conference>> {
        let cutoff = from.format("%Y-%m-%d").to_string();
        let mut out: Vec<Conference> = self
            .conferences()
            .into_iter()
            .filter(|c| c.date >= cutoff)
            .collect();
        out.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(out)
    }
}
