//! Article and source schemas.
//!
//! Payload entries are decoded leniently into `Raw*` structs and then
//! validated one by one, so a single malformed entry never fails a load.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("entry is not a JSON object: {0}")]
    Malformed(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("unknown sentiment '{0}'")]
    UnknownSentiment(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            _ => Err(ValidationError::UnknownSentiment(s.to_string())),
        }
    }
}

/// Article as it appears on the wire; every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawArticle {
    pub source: Option<String>,
    pub category: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
    pub timestamp: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    // Non-string values are dropped, not rejected
    pub keywords: Option<serde_json::Value>,
    pub sentiment: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub source: String,
    pub category: String,
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    #[serde(skip)]
    effective_at: Option<DateTime<Utc>>,
}

impl Article {
    /// `published_at` when it parses, otherwise `timestamp`.
    pub fn effective_at(&self) -> Option<DateTime<Utc>> {
        self.effective_at
    }

    /// Summary text, falling back to the description.
    pub fn summary_text(&self) -> &str {
        self.summary
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.description.as_deref())
            .unwrap_or("")
    }
}

impl TryFrom<RawArticle> for Article {
    type Error = ValidationError;

    fn try_from(raw: RawArticle) -> Result<Self, Self::Error> {
        let url = required(raw.url, "url")?;
        let title = required(raw.title, "title")?;
        let source = required(raw.source, "source")?;

        let sentiment = match raw.sentiment {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(value)) if value.is_empty() => None,
            Some(serde_json::Value::String(value)) => match value.parse::<Sentiment>() {
                Ok(sentiment) => Some(sentiment),
                Err(e) => {
                    debug!("Dropping sentiment on '{}': {}", url, e);
                    None
                }
            },
            Some(other) => {
                debug!("Dropping non-text sentiment on '{}': {}", url, other);
                None
            }
        };

        let effective_at = raw
            .published_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| raw.timestamp.as_deref().and_then(parse_timestamp));

        Ok(Article {
            source,
            category: raw.category.unwrap_or_default(),
            title,
            url,
            published_at: raw.published_at,
            timestamp: raw.timestamp,
            summary: raw.summary,
            description: raw.description,
            content: raw.content,
            keywords: string_items(raw.keywords),
            sentiment,
            effective_at,
        })
    }
}

/// String members of a JSON array; anything else yields nothing.
fn string_items(value: Option<serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSource {
    pub name: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub name: String,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TryFrom<RawSource> for Source {
    type Error = ValidationError;

    fn try_from(raw: RawSource) -> Result<Self, Self::Error> {
        Ok(Source {
            name: required(raw.name, "name")?,
            category: raw.category.unwrap_or_default(),
            kind: raw.kind.unwrap_or_default(),
            icon: raw.icon.filter(|i| !i.trim().is_empty()),
            description: raw.description.filter(|d| !d.trim().is_empty()),
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(field)),
    }
}

/// Validate a list of untyped entries, keeping the good ones.
///
/// Returns the accepted values and the number of rejected entries.
pub fn validate_entries<R, T>(entries: Vec<serde_json::Value>, kind: &str) -> (Vec<T>, usize)
where
    R: serde::de::DeserializeOwned,
    T: TryFrom<R, Error = ValidationError>,
{
    let mut accepted = Vec::with_capacity(entries.len());
    let mut rejected = 0;

    for (index, entry) in entries.into_iter().enumerate() {
        let result = serde_json::from_value::<R>(entry)
            .map_err(|e| ValidationError::Malformed(e.to_string()))
            .and_then(T::try_from);

        match result {
            Ok(value) => accepted.push(value),
            Err(e) => {
                warn!("Skipping {} entry #{}: {}", kind, index, e);
                rejected += 1;
            }
        }
    }

    (accepted, rejected)
}

/// Parse the timestamp formats found in aggregated feeds.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
