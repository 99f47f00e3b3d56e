// src/config/scrape.rs
use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, time::Duration};

use crate::error::ScrapeError;
use crate::types::DEFAULT_TOPIC;

pub const DEFAULT_SCRAPE_CONFIG_PATH: &str = "config/scrape.toml";
pub const ENV_SCRAPE_CONFIG_PATH: &str = "SCRAPE_CONFIG_PATH";

pub const ENV_STORE_URL: &str = "SUPABASE_URL";
pub const ENV_STORE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const ENV_AI_URL: &str = "AI_GATEWAY_URL";
pub const ENV_AI_KEY: &str = "AI_GATEWAY_API_KEY";
pub const ENV_AI_MODEL: &str = "AI_MODEL";
pub const ENV_MAX_CONCURRENCY: &str = "SCRAPE_MAX_CONCURRENCY";
pub const ENV_INTERVAL_SECS: &str = "SCRAPE_INTERVAL_SECS";

fn default_ai_endpoint() -> String {
    "https://ai.gateway.lovable.dev/v1/chat/completions".to_string()
}
fn default_ai_model() -> String {
    "google/gemini-2.5-flash".to_string()
}
fn default_ai_timeout_secs() -> u64 {
    60
}
fn default_fetch_timeout_secs() -> u64 {
    15
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}
fn default_max_html_chars() -> usize {
    30_000
}
fn default_max_concurrency() -> usize {
    1
}
fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSection {
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,
    /// "ENV" means: read from AI_GATEWAY_API_KEY
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            endpoint: default_ai_endpoint(),
            api_key: String::new(),
            model: default_ai_model(),
            timeout_secs: default_ai_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSection {
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Everything a scrape pass needs, built once and handed to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// PostgREST base URL (e.g. `https://xyz.supabase.co`).
    #[serde(default)]
    pub store_url: String,
    /// "ENV" means: read from SUPABASE_SERVICE_ROLE_KEY
    #[serde(default)]
    pub store_key: String,
    #[serde(default)]
    pub ai: AiSection,
    #[serde(default)]
    pub fetch: FetchSection,
    /// HTML prefix handed to the model, in characters.
    #[serde(default = "default_max_html_chars")]
    pub max_html_chars: usize,
    /// Sources processed at once; 1 keeps the pass strictly sequential.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Drop candidates dated before today even if the model returned them.
    #[serde(default)]
    pub reject_past_dates: bool,
    #[serde(default = "default_topic")]
    pub default_topic: String,
    #[serde(default)]
    pub schedule_interval_secs: Option<u64>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            store_url: String::new(),
            store_key: String::new(),
            ai: AiSection::default(),
            fetch: FetchSection::default(),
            max_html_chars: default_max_html_chars(),
            max_concurrency: default_max_concurrency(),
            reject_past_dates: false,
            default_topic: default_topic(),
            schedule_interval_secs: None,
        }
    }
}

impl ScrapeConfig {
    /// Parse a TOML document, then apply environment overrides.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut cfg: ScrapeConfig = toml::from_str(s).context("parsing scrape config")?;
        cfg.apply_env()?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading scrape config from {}", path.display()))?;
        Self::from_toml_str(&data)
    }

    /// Load using env var + fallbacks:
    /// 1) $SCRAPE_CONFIG_PATH (must exist)
    /// 2) config/scrape.toml
    /// 3) defaults + environment only
    pub fn load_default() -> anyhow::Result<Self> {
        if let Ok(p) = env::var(ENV_SCRAPE_CONFIG_PATH) {
            let path = Path::new(&p);
            if !path.exists() {
                bail!("{ENV_SCRAPE_CONFIG_PATH} points to non-existent path");
            }
            return Self::load_from_file(path);
        }
        let fallback = Path::new(DEFAULT_SCRAPE_CONFIG_PATH);
        if fallback.exists() {
            return Self::load_from_file(fallback);
        }
        Self::from_toml_str("")
    }

    fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Ok(v) = env::var(ENV_STORE_URL) {
            self.store_url = v;
        }
        if let Ok(v) = env::var(ENV_AI_URL) {
            self.ai.endpoint = v;
        }
        if let Ok(v) = env::var(ENV_AI_MODEL) {
            self.ai.model = v;
        }

        // Keys: "ENV" (or empty) in the file means read from the environment
        if self.store_key.trim().is_empty() || self.store_key.trim().eq_ignore_ascii_case("env") {
            self.store_key = env::var(ENV_STORE_KEY).unwrap_or_default();
        }
        if self.ai.api_key.trim().is_empty() || self.ai.api_key.trim().eq_ignore_ascii_case("env")
        {
            self.ai.api_key = env::var(ENV_AI_KEY).unwrap_or_default();
        }

        if let Ok(v) = env::var(ENV_MAX_CONCURRENCY) {
            self.max_concurrency = v
                .trim()
                .parse()
                .map_err(|_| anyhow!("{ENV_MAX_CONCURRENCY} must be a positive integer"))?;
        }
        if let Ok(v) = env::var(ENV_INTERVAL_SECS) {
            let secs: u64 = v
                .trim()
                .parse()
                .map_err(|_| anyhow!("{ENV_INTERVAL_SECS} must be an integer"))?;
            self.schedule_interval_secs = (secs > 0).then_some(secs);
        }
        Ok(())
    }

    fn sanitize(&mut self) {
        self.store_url = self.store_url.trim().trim_end_matches('/').to_string();
        if self.max_concurrency == 0 {
            self.max_concurrency = 1;
        }
        if self.max_html_chars == 0 {
            self.max_html_chars = default_max_html_chars();
        }
        if self.fetch.timeout_secs == 0 {
            self.fetch.timeout_secs = default_fetch_timeout_secs();
        }
        if self.ai.timeout_secs == 0 {
            self.ai.timeout_secs = default_ai_timeout_secs();
        }
        if self.default_topic.trim().is_empty() {
            self.default_topic = default_topic();
        }
        if self.schedule_interval_secs == Some(0) {
            self.schedule_interval_secs = None;
        }
    }

    /// Checks that the remote collaborators are reachable in principle.
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.ai.api_key.trim().is_empty() {
            return Err(ScrapeError::Config(format!("{ENV_AI_KEY} is not configured")));
        }
        if self.store_url.is_empty() {
            return Err(ScrapeError::Config(format!("{ENV_STORE_URL} is not configured")));
        }
        if self.store_key.trim().is_empty() {
            return Err(ScrapeError::Config(format!("{ENV_STORE_KEY} is not configured")));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai.timeout_secs)
    }

    pub fn schedule_interval(&self) -> Option<Duration> {
        self.schedule_interval_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_env() {
        for k in [
            ENV_SCRAPE_CONFIG_PATH,
            ENV_STORE_URL,
            ENV_STORE_KEY,
            ENV_AI_URL,
            ENV_AI_KEY,
            ENV_AI_MODEL,
            ENV_MAX_CONCURRENCY,
            ENV_INTERVAL_SECS,
        ] {
            env::remove_var(k);
        }
    }

    #[serial_test::serial]
    #[test]
    fn defaults_fill_missing_sections() {
        clear_env();
        let cfg = ScrapeConfig::from_toml_str(r#"store_url = "https://db.test/""#).unwrap();
        assert_eq!(cfg.store_url, "https://db.test");
        assert_eq!(cfg.fetch.timeout_secs, 15);
        assert_eq!(cfg.max_html_chars, 30_000);
        assert_eq!(cfg.max_concurrency, 1);
        assert_eq!(cfg.default_topic, DEFAULT_TOPIC);
        assert!(!cfg.reject_past_dates);
        assert!(cfg.schedule_interval().is_none());
    }

    #[serial_test::serial]
    #[test]
    fn env_keys_resolve_and_zero_values_are_reset() {
        clear_env();
        env::set_var(ENV_AI_KEY, "sk-test");
        env::set_var(ENV_STORE_KEY, "service-role");
        let cfg = ScrapeConfig::from_toml_str(
            r#"
store_url = "https://db.test"
max_concurrency = 0
schedule_interval_secs = 0

[ai]
api_key = "ENV"

[fetch]
timeout_secs = 0
"#,
        )
        .unwrap();
        assert_eq!(cfg.ai.api_key, "sk-test");
        assert_eq!(cfg.store_key, "service-role");
        assert_eq!(cfg.max_concurrency, 1);
        assert_eq!(cfg.fetch.timeout_secs, 15);
        assert!(cfg.schedule_interval_secs.is_none());
        assert!(cfg.validate().is_ok());
        clear_env();
    }

    #[serial_test::serial]
    #[test]
    fn validate_reports_missing_ai_key() {
        clear_env();
        let cfg = ScrapeConfig::from_toml_str(r#"store_url = "https://db.test""#).unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains(ENV_AI_KEY), "{err}");
    }

    #[serial_test::serial]
    #[test]
    fn bad_concurrency_env_is_an_error() {
        clear_env();
        env::set_var(ENV_MAX_CONCURRENCY, "many");
        assert!(ScrapeConfig::from_toml_str("").is_err());
        clear_env();
    }
}
