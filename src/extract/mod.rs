// src/extract/mod.rs
//! Extraction: turn a page's HTML into candidate conference records with a
//! structured-output completion call.
//!
//! The model never sees more than `max_html_chars` characters of the page; the
//! cut is made on characters, not on tag boundaries.

pub mod gateway;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Result, ScrapeError};
use crate::types::{ConferenceFormat, RawCandidate, TOPICS};

pub use gateway::GatewayExtractor;

/// Name of the single function the model is forced to call.
pub const TOOL_NAME: &str = "extract_conferences";

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Candidates found in `html`. `today` anchors the "future events only"
    /// instruction. Any failure is an `Extraction` error.
    async fn extract(&self, html: &str, today: NaiveDate) -> Result<Vec<RawCandidate>>;

    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Longest prefix of `html` with at most `max_chars` characters.
pub fn truncate_html(html: &str, max_chars: usize) -> &str {
    match html.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &html[..byte_idx],
        None => html,
    }
}

pub fn system_prompt(today: NaiveDate) -> String {
    format!(
        "Ты помощник, который извлекает сведения о научных конференциях из HTML-страниц \
         российских транспортных университетов. Сегодня {}. \
         Извлекай ТОЛЬКО предстоящие конференции, дата которых ещё не наступила.",
        today.format("%Y-%m-%d")
    )
}

pub fn user_prompt(html: &str, today: NaiveDate) -> String {
    let topics = TOPICS
        .iter()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let formats = ConferenceFormat::ALL
        .iter()
        .map(|f| format!("\"{}\"", f.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    let today = today.format("%Y-%m-%d");

    format!(
        "Найди в HTML ниже предстоящие научные конференции.\n\
         \n\
         Для каждой конференции заполни поля:\n\
         - title: название конференции\n\
         - date: дата начала (YYYY-MM-DD)\n\
         - end_date: дата окончания (YYYY-MM-DD), если указана\n\
         - location: город или место проведения\n\
         - description: краткое описание (1-2 предложения)\n\
         - format: одно из {formats}\n\
         - topic: одно из {topics}\n\
         - registration_url: ссылка на регистрацию\n\
         - registration_deadline: последний день регистрации (YYYY-MM-DD)\n\
         - contact_email: контактный e-mail\n\
         - contact_phone: контактный телефон\n\
         - venue: адрес или здание\n\
         - fee: стоимость участия\n\
         \n\
         Если сведений нет, пропусти поле. Возвращай только конференции с датой >= {today}.\n\
         \n\
         HTML:\n{html}"
    )
}

/// JSON schema of the forced function call: `{ conferences: [ {...} ] }`.
pub fn output_schema() -> Value {
    let string = json!({ "type": "string" });
    let formats: Vec<&str> = ConferenceFormat::ALL.iter().map(|f| f.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "conferences": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": string,
                        "date": string,
                        "end_date": string,
                        "location": string,
                        "description": string,
                        "format": { "type": "string", "enum": formats },
                        "topic": string,
                        "registration_url": string,
                        "registration_deadline": string,
                        "contact_email": string,
                        "contact_phone": string,
                        "venue": string,
                        "fee": string
                    },
                    "required": ["title", "date", "location", "description", "format", "topic"]
                }
            }
        },
        "required": ["conferences"]
    })
}

/// `tools` entry for the chat-completions request.
pub fn tool_definition() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": TOOL_NAME,
            "description": "Extract upcoming conference announcements",
            "parameters": output_schema()
        }
    })
}

/// Parse the function-call `arguments` string. A missing `conferences` key
/// means nothing was found; anything that is not a JSON object is an error.
pub fn parse_tool_arguments(arguments: &str) -> Result<Vec<RawCandidate>> {
    #[derive(Deserialize)]
    struct Args {
        #[serde(default)]
        conferences: Option<Vec<Value>>,
    }

    let args: Args = serde_json::from_str(arguments)
        .map_err(|e| ScrapeError::Extraction(format!("unparseable tool arguments: {e}")))?;

    // One odd item should not cost the whole page.
    let mut out = Vec::new();
    for item in args.conferences.unwrap_or_default() {
        match serde_json::from_value::<RawCandidate>(item) {
            Ok(c) => out.push(c),
            Err(e) => tracing::debug!(error = %e, "skipping non-object candidate"),
        }
    }
    Ok(out)
}
