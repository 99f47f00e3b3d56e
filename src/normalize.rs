// src/normalize.rs
//! Hard boundary between model output and storage.
//!
//! Rules per candidate:
//! - `date` must be `YYYY-MM-DD`, else the candidate is dropped;
//! - blank `title` drops the candidate (it is part of the uniqueness key);
//! - `location` defaults to the source name, `description` to "",
//!   `format` to "Очно" (also for unrecognized labels), `topic` to the
//!   configured default;
//! - `university` / `source_url` always come from the source.

use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::error::ScrapeError;
use crate::types::{Conference, ConferenceFormat, RawCandidate, Source, DEFAULT_TOPIC};

fn iso_date_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("iso date regex"))
}

pub fn is_iso_date(s: &str) -> bool {
    iso_date_re().is_match(s)
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    default_topic: String,
    /// When set, candidates dated before this day are dropped too.
    not_before: Option<NaiveDate>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            default_topic: DEFAULT_TOPIC.to_string(),
            not_before: None,
        }
    }
}

/// Candidates kept vs dropped for one source.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub kept: Vec<Conference>,
    pub dropped: Vec<ScrapeError>,
}

impl Normalizer {
    pub fn new(default_topic: impl Into<String>) -> Self {
        Self {
            default_topic: default_topic.into(),
            not_before: None,
        }
    }

    pub fn rejecting_before(mut self, day: NaiveDate) -> Self {
        self.not_before = Some(day);
        self
    }

    /// Validate and coerce one candidate.
    pub fn normalize_one(
        &self,
        source: &Source,
        raw: RawCandidate,
    ) -> Result<Conference, ScrapeError> {
        let title = raw.title.unwrap_or_default();
        let reject = |reason: String| ScrapeError::Validation {
            title: title.clone(),
            reason,
        };

        let date = match raw.date {
            Some(d) if is_iso_date(&d) => d,
            Some(d) => return Err(reject(format!("date '{d}' is not YYYY-MM-DD"))),
            None => return Err(reject("missing date".to_string())),
        };
        if title.is_empty() {
            return Err(reject("missing title".to_string()));
        }
        if let Some(min) = self.not_before {
            // Pattern-valid but impossible dates (2030-02-31) only matter here.
            match NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
                Ok(d) if d < min => return Err(reject(format!("date {date} is in the past"))),
                Ok(_) => {}
                Err(_) => return Err(reject(format!("date {date} does not exist"))),
            }
        }

        Ok(Conference {
            title: title.clone(),
            university: source.name.clone(),
            date,
            end_date: raw.end_date,
            location: raw.location.unwrap_or_else(|| source.name.clone()),
            description: raw.description.unwrap_or_default(),
            format: raw
                .format
                .as_deref()
                .and_then(ConferenceFormat::parse)
                .unwrap_or_default(),
            topic: raw.topic.unwrap_or_else(|| self.default_topic.clone()),
            registration_url: raw.registration_url,
            registration_deadline: raw.registration_deadline,
            contact_email: raw.contact_email,
            contact_phone: raw.contact_phone,
            venue: raw.venue,
            fee: raw.fee,
            source_url: source.url.clone(),
        })
    }

    /// Normalize every candidate of one source; invalid ones never affect siblings.
    pub fn normalize_all(&self, source: &Source, raws: Vec<RawCandidate>) -> NormalizeOutcome {
        let mut out = NormalizeOutcome::default();
        for raw in raws {
            match self.normalize_one(source, raw) {
                Ok(c) => out.kept.push(c),
                Err(e) => {
                    tracing::info!(source = %source.name, error = %e, "dropping candidate");
                    out.dropped.push(e);
                }
            }
        }
        out
    }
}
