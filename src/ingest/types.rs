// src/ingest/types.rs
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One feed item after parsing, in the shape every source format maps into.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub title: String,
    /// Identity key used for deduplication across sources.
    pub link: String,
    pub summary: String,
    /// Publish date exactly as the source wrote it.
    #[serde(rename = "published")]
    pub published_raw: String,
    /// Unix seconds; 0 when the date was missing or unparseable.
    pub published_ts: i64,
    #[serde(rename = "source")]
    pub source_id: String,
}

/// Diagnostics attached to every loader result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchMeta {
    pub last_fetch: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Output of one news fetch cycle. Cached as a whole and replaced as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregationResult {
    pub items: Vec<NormalizedRecord>,
    pub meta: FetchMeta,
}

impl AggregationResult {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// A remote source and how long a single request to it may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub url: String,
    pub timeout: Duration,
}

impl SourceConfig {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    /// Records from this source are tagged with its URL.
    pub fn source_id(&self) -> &str {
        &self.url
    }
}

/// Raw response body of a successful (HTTP 200) fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub body: Vec<u8>,
    pub status: u16,
}

/// How the aggregator schedules the per-source requests of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    #[default]
    Sequential,
    Concurrent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_with_wire_field_names() {
        let rec = NormalizedRecord {
            title: "Pole for Norris".into(),
            link: "https://x/1".into(),
            summary: "".into(),
            published_raw: "Sun, 01 Sep 2024 14:00:00 GMT".into(),
            published_ts: 1_725_199_200,
            source_id: "https://feed.test/rss".into(),
        };
        let v = serde_json::to_value(&rec).unwrap();
        for key in ["title", "link", "summary", "published", "published_ts", "source"] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
        assert!(v.get("published_raw").is_none());
    }
}
