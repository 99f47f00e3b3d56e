// src/error.rs
//! Failure taxonomy of a scrape pass.
//!
//! `Registry` and `Persistence` end the pass with an error; `Fetch`,
//! `Extraction` and `Validation` are soft and stay inside one source's cycle.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    /// Active sources could not be listed.
    #[error("source registry error: {0}")]
    Registry(String),

    /// Page could not be retrieved (network, timeout, non-2xx).
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Fetch exceeded its time budget.
    #[error("fetch timed out for {url} after {after:?}")]
    FetchTimeout { url: String, after: Duration },

    /// Completion service failed or returned something other than the schema.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// A single candidate was rejected.
    #[error("invalid candidate '{title}': {reason}")]
    Validation { title: String, reason: String },

    /// Bulk upsert or a store write failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Required configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ScrapeError {
    /// Soft errors are absorbed inside a source iteration.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. }
                | Self::FetchTimeout { .. }
                | Self::Extraction(_)
                | Self::Validation { .. }
        )
    }
}

pub type Result<T, E = ScrapeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_and_fatal_kinds() {
        assert!(ScrapeError::Extraction("x".into()).is_soft());
        assert!(ScrapeError::FetchTimeout {
            url: "https://a.test".into(),
            after: Duration::from_secs(15)
        }
        .is_soft());
        assert!(!ScrapeError::Registry("down".into()).is_soft());
        assert!(!ScrapeError::Persistence("conflict storm".into()).is_soft());
    }

    #[test]
    fn messages_are_readable() {
        let e = ScrapeError::Fetch {
            url: "https://a.test".into(),
            reason: "HTTP 503".into(),
        };
        assert_eq!(e.to_string(), "fetch failed for https://a.test: HTTP 503");
    }
}
