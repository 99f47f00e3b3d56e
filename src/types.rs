// src/types.rs
//! Data model shared by the pipeline stages: configured sources, raw AI
//! candidates and the canonical conference record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Topic used when a candidate does not name one.
pub const DEFAULT_TOPIC: &str = "Транспортные системы";

/// Closed topic vocabulary offered to the model.
pub const TOPICS: &[&str] = &[
    "Железнодорожный транспорт",
    "Автомобильный транспорт",
    "Логистика",
    "Цифровые технологии",
    "Экология",
    "Транспортные системы",
];

/// A university website registered as a scrape target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    /// University label, e.g. "ПГУПС".
    pub name: String,
    pub url: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub last_scraped_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

// Registry ids may be uuids or serial integers depending on the table.
fn id_string<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(de)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unsupported source id: {other}"
        ))),
    }
}

/// How a conference is held.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ConferenceFormat {
    #[default]
    #[serde(rename = "Очно")]
    InPerson,
    #[serde(rename = "Онлайн")]
    Online,
    #[serde(rename = "Гибридный")]
    Hybrid,
}

impl ConferenceFormat {
    pub const ALL: [ConferenceFormat; 3] = [Self::InPerson, Self::Online, Self::Hybrid];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InPerson => "Очно",
            Self::Online => "Онлайн",
            Self::Hybrid => "Гибридный",
        }
    }

    /// Exact match against the three recognized labels (surrounding whitespace ignored).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

/// Unvalidated conference description as returned by the extraction model.
///
/// Every field is optional. Strings, numbers (stringified) and null are all
/// accepted; blank strings decode as `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawCandidate {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(default, alias = "endDate", deserialize_with = "lenient_string")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub format: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub topic: Option<String>,
    #[serde(default, alias = "registrationUrl", deserialize_with = "lenient_string")]
    pub registration_url: Option<String>,
    #[serde(
        default,
        alias = "registrationDeadline",
        deserialize_with = "lenient_string"
    )]
    pub registration_deadline: Option<String>,
    #[serde(default, alias = "contactEmail", deserialize_with = "lenient_string")]
    pub contact_email: Option<String>,
    #[serde(default, alias = "contactPhone", deserialize_with = "lenient_string")]
    pub contact_phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub venue: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fee: Option<String>,
    // Self-attribution from the model; never copied into a Conference.
    #[serde(default, deserialize_with = "lenient_string")]
    pub university: Option<String>,
    #[serde(default, alias = "sourceUrl", deserialize_with = "lenient_string")]
    pub source_url: Option<String>,
}

fn lenient_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<serde_json::Value>::deserialize(de)?;
    Ok(match v {
        Some(serde_json::Value::String(s)) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Canonical, persisted conference record.
///
/// Serializes in the consumer-facing camelCase shape; absent optionals are
/// omitted rather than emitted as null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conference {
    pub title: String,
    pub university: String,
    /// `YYYY-MM-DD`
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub location: String,
    pub description: String,
    pub format: ConferenceFormat,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_deadline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<String>,
    /// Page the record was extracted from; always the originating source's URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_url: String,
}

/// Uniqueness triple `(title, university, date)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConferenceKey {
    pub title: String,
    pub university: String,
    pub date: String,
}

impl Conference {
    pub fn key(&self) -> ConferenceKey {
        ConferenceKey {
            title: self.title.clone(),
            university: self.university.clone(),
            date: self.date.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_only_known_labels() {
        assert_eq!(ConferenceFormat::parse("Онлайн"), Some(ConferenceFormat::Online));
        assert_eq!(
            ConferenceFormat::parse(" Гибридный "),
            Some(ConferenceFormat::Hybrid)
        );
        assert_eq!(ConferenceFormat::parse("online"), None);
        assert_eq!(ConferenceFormat::parse(""), None);
    }

    #[test]
    fn raw_candidate_is_lenient() {
        let v = serde_json::json!({
            "title": "  Транспорт 2030 ",
            "date": "2030-05-14",
            "endDate": "2030-05-16",
            "fee": 1500,
            "venue": "",
            "location": null,
            "unknown": {"nested": true}
        });
        let c: RawCandidate = serde_json::from_value(v).unwrap();
        assert_eq!(c.title.as_deref(), Some("Транспорт 2030"));
        assert_eq!(c.end_date.as_deref(), Some("2030-05-16"));
        assert_eq!(c.fee.as_deref(), Some("1500"));
        assert_eq!(c.venue, None);
        assert_eq!(c.location, None);
    }

    #[test]
    fn conference_omits_absent_optionals() {
        let c = Conference {
            title: "T".into(),
            university: "U".into(),
            date: "2030-01-01".into(),
            end_date: None,
            location: "L".into(),
            description: String::new(),
            format: ConferenceFormat::Online,
            topic: DEFAULT_TOPIC.into(),
            registration_url: None,
            registration_deadline: None,
            contact_email: None,
            contact_phone: None,
            venue: Some("Hall 1".into()),
            fee: None,
            source_url: "https://u.test".into(),
        };
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["format"], "Онлайн");
        assert_eq!(v["sourceUrl"], "https://u.test");
        assert_eq!(v["venue"], "Hall 1");
        assert!(v.get("endDate").is_none());
        assert!(v.get("fee").is_none());
    }
}
