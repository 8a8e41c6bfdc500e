//! Core data types shared across the fetch pipeline, analysis engine, and snapshot store.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::HashMap;

/// What kind of adapter a source needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rss,
    Video,
}

impl Default for SourceKind {
    fn default() -> Self {
        SourceKind::Rss
    }
}

/// Immutable configuration for one polled source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default, with = "duration_seconds_opt")]
    pub interval: Option<std::time::Duration>,
    #[serde(default = "default_timeout_secs")]
    pub timeout: f64,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub retry_backoff: Option<f64>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_timeout_secs() -> f64 {
    30.0
}

mod duration_seconds_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs: Option<f64> = Option::deserialize(d)?;
        Ok(secs.map(Duration::from_secs_f64))
    }
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            interval: None,
            timeout: default_timeout_secs(),
            max_retries: None,
            retry_backoff: None,
            language: None,
            country: None,
            kind: SourceKind::Rss,
            extra: HashMap::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn use_upload_date_as_published(&self) -> bool {
        self.extra
            .get("use_upload_date_as_published")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn summary_description_limit(&self) -> usize {
        self.extra
            .get("summary_description_limit")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(280)
    }
}

/// One unit of ingested content. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceItem {
    pub id: String,
    pub title: String,
    pub url: String,
    /// UTC wall time with timezone information already stripped.
    pub published: NaiveDateTime,
    pub summary: Option<String>,
    pub language: Option<String>,
}

impl SourceItem {
    /// SHA-1 over `id | url | title | published-ISO | language`, prefixed `sha1:`.
    pub fn fingerprint(&self) -> String {
        let canonical = format!(
            "{}|{}|{}|{}|{}",
            self.id,
            self.url,
            self.title,
            self.published.format("%Y-%m-%dT%H:%M:%S"),
            self.language.as_deref().unwrap_or(""),
        );
        let mut hasher = Sha1::new();
        hasher.update(canonical.as_bytes());
        format!("sha1:{:x}", hasher.finalize())
    }
}

/// Outcome of polling one source once.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    pub items: Vec<SourceItem>,
    pub not_modified: bool,
    /// Response headers passed through for callers that want them (e.g. a
    /// future caching layer); the monitor itself only reads `items`/`not_modified`.
    pub headers: Option<HashMap<String, String>>,
}

impl FetchResult {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            not_modified: false,
            headers: None,
        }
    }

    pub fn not_modified() -> Self {
        Self {
            items: Vec::new(),
            not_modified: true,
            headers: None,
        }
    }
}

/// A bookkeeping record in the sliding-window event buffer.
#[derive(Debug, Clone)]
pub struct Event {
    pub source: String,
    pub item: SourceItem,
    pub fingerprint: String,
    pub seen_at: DateTime<Utc>,
}

/// Output of scoring: a keyword and the items that contributed to its weight.
#[derive(Debug, Clone, Serialize)]
pub struct Trend {
    pub keyword: String,
    pub score: f64,
    pub items: Vec<SourceItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> SourceItem {
        SourceItem {
            id: id.to_string(),
            title: "Title".to_string(),
            url: "https://example.com".to_string(),
            published: chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            summary: None,
            language: Some("en".to_string()),
        }
    }

    #[test]
    fn fingerprint_is_stable_given_identical_fields() {
        let a = item("1");
        let b = item("1");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert!(a.fingerprint().starts_with("sha1:"));
    }

    #[test]
    fn fingerprint_differs_on_id_change() {
        assert_ne!(item("1").fingerprint(), item("2").fingerprint());
    }
}
