// src/store/mod.rs
//! Persistence seams: the source registry (read active targets, stamp
//! `last_scraped_at`) and the conference store (bulk insert-or-ignore,
//! upcoming read path).

pub mod memory;
pub mod postgrest;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::types::{Conference, Source};

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

#[async_trait]
pub trait SourceRegistry: Send + Sync {
    /// Sources with `is_active = true`, in no particular order.
    async fn list_active(&self) -> Result<Vec<Source>>;

    /// Record that a processing attempt happened at `at`.
    async fn mark_scraped(&self, source_id: &str, at: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait ConferenceStore: Send + Sync {
    /// Insert every record whose `(title, university, date)` is new; existing
    /// rows are left untouched. Returns how many rows were newly written when
    /// the backend can tell, otherwise `None`.
    async fn upsert_ignore_duplicates(&self, records: &[Conference]) -> Result<Option<usize>>;

    /// Conferences dated on or after `from`, ascending by date.
    async fn upcoming(&self, from: NaiveDate) -> Result<Vec<Conference>>;
}
