// src/extract/gateway.rs
//! OpenAI-compatible chat-completions client with a forced tool call.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    parse_tool_arguments, system_prompt, tool_definition, truncate_html, user_prompt, Extractor,
    TOOL_NAME,
};
use crate::config::ScrapeConfig;
use crate::error::{Result, ScrapeError};
use crate::types::RawCandidate;

pub struct GatewayExtractor {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_html_chars: usize,
}

impl GatewayExtractor {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        max_html_chars: usize,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("conference-scraper/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .map_err(|e| ScrapeError::Config(format!("completion http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_html_chars,
        })
    }

    pub fn from_config(cfg: &ScrapeConfig) -> Result<Self> {
        Self::new(
            cfg.ai.endpoint.clone(),
            cfg.ai.api_key.clone(),
            cfg.ai.model.clone(),
            cfg.ai_timeout(),
            cfg.max_html_chars,
        )
    }

    /// Request body sent to the completion service.
    pub fn request_body(&self, html: &str, today: NaiveDate) -> Value {
        let excerpt = truncate_html(html, self.max_html_chars);
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system_prompt(today),
                },
                Msg {
                    role: "user",
                    content: user_prompt(excerpt, today),
                },
            ],
            tools: vec![tool_definition()],
            tool_choice: json!({ "type": "function", "function": { "name": TOOL_NAME } }),
        };
        serde_json::to_value(req).unwrap_or(Value::Null)
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    tools: Vec<Value>,
    tool_choice: Value,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Deserialize)]
struct FunctionCall {
    #[serde(default)]
    arguments: Option<String>,
}

#[async_trait]
impl Extractor for GatewayExtractor {
    async fn extract(&self, html: &str, today: NaiveDate) -> Result<Vec<RawCandidate>> {
        let body = self.request_body(html, today);

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ScrapeError::Extraction(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let text: String = text.chars().take(300).collect();
            return Err(ScrapeError::Extraction(format!(
                "service returned HTTP {}: {text}",
                status.as_u16()
            )));
        }

        let parsed: Resp = resp
            .json()
            .await
            .map_err(|e| ScrapeError::Extraction(format!("malformed response: {e}")))?;

        let arguments = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.tool_calls.unwrap_or_default().into_iter().next())
            .and_then(|t| t.function.arguments);

        match arguments {
            Some(args) => parse_tool_arguments(&args),
            // no structured payload: nothing extracted
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &'static str {
        "gateway"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_forces_the_tool_and_truncates_html() {
        let ex = GatewayExtractor::new(
            "http://localhost/v1/chat/completions",
            "k",
            "test-model",
            Duration::from_secs(5),
            10,
        )
        .unwrap();
        let html = "0123456789ABCDEF";
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let body = ex.request_body(html, today);

        assert_eq!(body["model"], "test-model");
        assert_eq!(body["tool_choice"]["function"]["name"], TOOL_NAME);
        assert_eq!(body["tools"][0]["function"]["name"], TOOL_NAME);
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.ends_with("0123456789"));
        assert!(!user.contains("ABCDEF"));
        assert_eq!(body["messages"][0]["role"], "system");
    }
}
