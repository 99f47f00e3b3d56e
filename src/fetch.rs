// src/fetch.rs
//! Page fetcher: one GET per source, bounded by a timeout, browser user-agent.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{Result, ScrapeError};

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Raw response body as text. Non-2xx, timeouts and transport errors are
    /// all `Err` and only affect the current source.
    async fn fetch(&self, url: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| ScrapeError::Config(format!("fetch http client: {e}")))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let fut = async {
            let resp = self.client.get(url).send().await.map_err(|e| ScrapeError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            let status = resp.status();
            if !status.is_success() {
                return Err(ScrapeError::Fetch {
                    url: url.to_string(),
                    reason: format!("HTTP {}", status.as_u16()),
                });
            }
            resp.text().await.map_err(|e| ScrapeError::Fetch {
                url: url.to_string(),
                reason: format!("reading body: {e}"),
            })
        };

        // Covers headers and body together.
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(ScrapeError::FetchTimeout {
                url: url.to_string(),
                after: self.timeout,
            }),
        }
    }
}
