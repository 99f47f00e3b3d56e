// src/store/postgrest.rs
//! Supabase / PostgREST backend.
//!
//! Tables: `scraping_sources (id, name, url, is_active, last_scraped_at)` and
//! `conferences (..., unique (title, university, date))`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ConferenceStore, SourceRegistry};
use crate::error::{Result, ScrapeError};
use crate::types::{Conference, ConferenceFormat, Source};

const SOURCES_TABLE: &str = "scraping_sources";
const CONFERENCES_TABLE: &str = "conferences";
const CONFLICT_TARGET: &str = "title,university,date";

#[derive(Clone)]
pub struct PostgrestStore {
    base_url: String,
    api_key: String,
    client: Client,
}

impl PostgrestStore {
    /// `base_url` is the project URL; `/rest/v1` is appended per request.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ScrapeError::Config(format!("store http client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        rb.header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

/// Storage-boundary row: snake_case, absent optionals as null.
#[derive(Debug, Serialize, Deserialize)]
struct ConferenceRow {
    title: String,
    university: String,
    date: String,
    end_date: Option<String>,
    location: String,
    #[serde(default)]
    description: Option<String>,
    format: String,
    topic: String,
    registration_url: Option<String>,
    #[serde(default)]
    registration_deadline: Option<String>,
    #[serde(default)]
    contact_email: Option<String>,
    #[serde(default)]
    contact_phone: Option<String>,
    venue: Option<String>,
    fee: Option<String>,
    #[serde(default)]
    source_url: Option<String>,
}

impl From<&Conference> for ConferenceRow {
    fn from(c: &Conference) -> Self {
        Self {
            title: c.title.clone(),
            university: c.university.clone(),
            date: c.date.clone(),
            end_date: c.end_date.clone(),
            location: c.location.clone(),
            description: Some(c.description.clone()),
            format: c.format.as_str().to_string(),
            topic: c.topic.clone(),
            registration_url: c.registration_url.clone(),
            registration_deadline: c.registration_deadline.clone(),
            contact_email: c.contact_email.clone(),
            contact_phone: c.contact_phone.clone(),
            venue: c.venue.clone(),
            fee: c.fee.clone(),
            source_url: Some(c.source_url.clone()),
        }
    }
}

impl From<ConferenceRow> for Conference {
    fn from(r: ConferenceRow) -> Self {
        let blank_to_none = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            title: r.title,
            university: r.university,
            date: r.date,
            end_date: blank_to_none(r.end_date),
            location: r.location,
            description: r.description.unwrap_or_default(),
            // hand-edited rows may hold other labels
            format: ConferenceFormat::parse(&r.format).unwrap_or_default(),
            topic: r.topic,
            registration_url: blank_to_none(r.registration_url),
            registration_deadline: blank_to_none(r.registration_deadline),
            contact_email: blank_to_none(r.contact_email),
            contact_phone: blank_to_none(r.contact_phone),
            venue: blank_to_none(r.venue),
            fee: blank_to_none(r.fee),
            source_url: r.source_url.unwrap_or_default(),
        }
    }
}

async fn error_body(resp: reqwest::Response) -> String {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let text: String = text.chars().take(300).collect();
    format!("HTTP {status}: {text}")
}

#[async_trait]
impl SourceRegistry for PostgrestStore {
    async fn list_active(&self) -> Result<Vec<Source>> {
        let resp = self
            .authed(self.client.get(self.table_url(SOURCES_TABLE)))
            .query(&[
                ("select", "id,name,url,is_active,last_scraped_at"),
                ("is_active", "eq.true"),
            ])
            .send()
            .await
            .map_err(|e| ScrapeError::Registry(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ScrapeError::Registry(error_body(resp).await));
        }
        resp.json::<Vec<Source>>()
            .await
            .map_err(|e| ScrapeError::Registry(format!("decoding sources: {e}")))
    }

    async fn mark_scraped(&self, source_id: &str, at: DateTime<Utc>) -> Result<()> {
        let id_filter = format!("eq.{source_id}");
        let resp = self
            .authed(self.client.patch(self.table_url(SOURCES_TABLE)))
            .query(&[("id", id_filter.as_str())])
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "last_scraped_at": at.to_rfc3339() }))
            .send()
            .await
            .map_err(|e| ScrapeError::Persistence(format!("mark_scraped request: {e}")))?;

        if !resp.status().is_success() {
            return Err(ScrapeError::Persistence(error_body(resp).await));
        }
        Ok(())
    }
}

#[async_trait]
impl ConferenceStore for PostgrestStore {
    async fn upsert_ignore_duplicates(&self, records: &[Conference]) -> Result<Option<usize>> {
        if records.is_empty() {
            return Ok(Some(0));
        }
        let rows: Vec<ConferenceRow> = records.iter().map(ConferenceRow::from).collect();
        let resp = self
            .authed(self.client.post(self.table_url(CONFERENCES_TABLE)))
            .query(&[("on_conflict", CONFLICT_TARGET)])
            .header("Prefer", "resolution=ignore-duplicates,return=minimal")
            .json(&rows)
            .send()
            .await
            .map_err(|e| ScrapeError::Persistence(format!("upsert request: {e}")))?;

        if !resp.status().is_success() {
            return Err(ScrapeError::Persistence(error_body(resp).await));
        }
        // return=minimal: the server does not say how many rows were new.
        Ok(None)
    }

    async fn upcoming(&self, from: NaiveDate) -> Result<Vec<Conference>> {
        let gte = format!("gte.{}", from.format("%Y-%m-%d"));
        let resp = self
            .authed(self.client.get(self.table_url(CONFERENCES_TABLE)))
            .query(&[
                ("select", "*"),
                ("date", gte.as_str()),
                ("order", "date.asc"),
            ])
            .send()
            .await
            .map_err(|e| ScrapeError::Persistence(format!("upcoming request: {e}")))?;

        if !resp.status().is_success() {
            return Err(ScrapeError::Persistence(error_body(resp).await));
        }
        let rows = resp
            .json::<Vec<ConferenceRow>>()
            .await
            .map_err(|e| ScrapeError::Persistence(format!("decoding conferences: {e}")))?;
        Ok(rows.into_iter().map(Conference::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_roundtrip_restores_canonical_shape() {
        let row = ConferenceRow {
            title: "T".into(),
            university: "U".into(),
            date: "2030-01-01".into(),
            end_date: Some(String::new()),
            location: "L".into(),
            description: None,
            format: "hybrid?".into(),
            topic: "Экология".into(),
            registration_url: None,
            registration_deadline: Some("2029-12-01".into()),
            contact_email: None,
            contact_phone: None,
            venue: None,
            fee: Some("  ".into()),
            source_url: None,
        };
        let c = Conference::from(row);
        assert_eq!(c.end_date, None);
        assert_eq!(c.fee, None);
        assert_eq!(c.format, ConferenceFormat::InPerson);
        assert_eq!(c.registration_deadline.as_deref(), Some("2029-12-01"));
        assert_eq!(c.description, "");
    }

    #[test]
    fn rows_serialize_nulls_for_absent_fields() {
        let c = Conference::from(ConferenceRow {
            title: "T".into(),
            university: "U".into(),
            date: "2030-01-01".into(),
            end_date: None,
            location: "L".into(),
            description: Some("d".into()),
            format: "Онлайн".into(),
            topic: "Логистика".into(),
            registration_url: None,
            registration_deadline: None,
            contact_email: None,
            contact_phone: None,
            venue: None,
            fee: None,
            source_url: Some("https://u.test".into()),
        });
        let v = serde_json::to_value(ConferenceRow::from(&c)).unwrap();
        assert!(v["end_date"].is_null());
        assert_eq!(v["format"], "Онлайн");
        assert_eq!(v["source_url"], "https://u.test");
    }
}
