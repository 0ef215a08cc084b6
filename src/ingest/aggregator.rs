// src/ingest/aggregator.rs
//! News loader: one fetch cycle over every configured source.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::{counter, gauge, histogram};

use crate::ingest::client::{HttpSourceClient, SourceClient};
use crate::ingest::error::FetchError;
use crate::ingest::merge::Merger;
use crate::ingest::parser::parse_feed;
use crate::ingest::types::{AggregationResult, FetchMeta, FetchMode, SourceConfig};

pub const DEFAULT_MAX_ITEMS: usize = 50;

/// Runs fetch → parse → merge across the source list and remembers how the
/// most recent cycle went.
pub struct Aggregator {
    sources: Vec<SourceConfig>,
    client: Arc<dyn SourceClient>,
    max_items: usize,
    mode: FetchMode,
    meta: Mutex<FetchMeta>,
}

impl Aggregator {
    pub fn new(sources: Vec<SourceConfig>) -> anyhow::Result<Self> {
        Ok(Self::with_client(sources, Arc::new(HttpSourceClient::new()?)))
    }

    pub fn with_client(sources: Vec<SourceConfig>, client: Arc<dyn SourceClient>) -> Self {
        Self {
            sources,
            client,
            max_items: DEFAULT_MAX_ITEMS,
            mode: FetchMode::default(),
            meta: Mutex::new(FetchMeta::default()),
        }
    }

    pub fn max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn fetch_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    /// Start of the most recent cycle, if any ran.
    pub fn last_fetch_time(&self) -> Option<DateTime<Utc>> {
        self.meta_snapshot().last_fetch
    }

    /// Last per-source failure of the most recent cycle.
    pub fn last_error(&self) -> Option<String> {
        self.meta_snapshot().last_error
    }

    fn meta_snapshot(&self) -> FetchMeta {
        match self.meta.lock() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    fn set_meta(&self, meta: FetchMeta) {
        match self.meta.lock() {
            Ok(mut g) => *g = meta,
            Err(poison) => *poison.into_inner() = meta,
        }
    }

    /// One fetch cycle. Never fails: sources that error contribute nothing
    /// and the last such error is reported in the result metadata.
    pub async fn fetch(&self) -> AggregationResult {
        ensure_metrics_described();

        let started = Utc::now();
        let t0 = std::time::Instant::now();
        self.set_meta(FetchMeta {
            last_fetch: Some(started),
            last_error: None,
        });

        // Outcomes are consumed in configured order in both modes, so the
        // first-wins tie-break and `last_error` do not depend on timing.
        let outcomes = match self.mode {
            FetchMode::Sequential => {
                let mut v = Vec::with_capacity(self.sources.len());
                for src in &self.sources {
                    v.push(self.client.fetch(src).await);
                }
                v
            }
            FetchMode::Concurrent => {
                join_all(self.sources.iter().map(|src| self.client.fetch(src))).await
            }
        };

        let mut merger = Merger::new();
        let mut last_error: Option<FetchError> = None;
        for (src, outcome) in self.sources.iter().zip(outcomes) {
            match outcome {
                Ok(payload) => {
                    let records = parse_feed(&payload.body, src.source_id());
                    tracing::debug!(
                        target: "ingest",
                        source = %src.url,
                        records = records.len(),
                        "source parsed"
                    );
                    merger.extend(records);
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", error = %e, source = %src.url, "source fetch failed");
                    counter!("feed_source_errors_total", "kind" => e.kind()).increment(1);
                    last_error = Some(e);
                }
            }
        }

        let accumulated = merger.len();
        let items = merger.finalize(self.max_items);
        let meta = FetchMeta {
            last_fetch: Some(started),
            last_error: last_error.map(|e| e.to_string()),
        };
        self.set_meta(meta.clone());

        counter!("feed_records_kept_total").increment(items.len() as u64);
        gauge!("feed_last_fetch_ts").set(started.timestamp() as f64);
        histogram!("feed_fetch_cycle_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::info!(
            target: "ingest",
            sources = self.sources.len(),
            accumulated,
            kept = items.len(),
            failed = meta.last_error.is_some(),
            "news fetch cycle finished"
        );

        AggregationResult { items, meta }
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};
    use once_cell::sync::OnceCell;

    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "feed_records_parsed_total",
            "Records parsed from source payloads."
        );
        describe_counter!(
            "feed_records_kept_total",
            "Records kept after dedupe and truncation."
        );
        describe_counter!(
            "feed_records_deduped_total",
            "Records dropped for a duplicate or empty link."
        );
        describe_counter!("feed_source_errors_total", "Per-source fetch failures.");
        describe_counter!("feed_parse_errors_total", "Payloads that failed to parse.");
        describe_histogram!("feed_parse_ms", "Payload parse time in milliseconds.");
        describe_histogram!("feed_fetch_cycle_ms", "Full fetch cycle time in milliseconds.");
        describe_gauge!("feed_last_fetch_ts", "Unix ts when the last fetch cycle started.");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::RawPayload;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    /// In-memory client keyed by URL; unknown URLs time out.
    struct MapClient(HashMap<String, Result<String, FetchError>>);

    #[async_trait]
    impl SourceClient for MapClient {
        async fn fetch(&self, source: &SourceConfig) -> Result<RawPayload, FetchError> {
            match self.0.get(&source.url) {
                Some(Ok(body)) => Ok(RawPayload {
                    body: body.clone().into_bytes(),
                    status: 200,
                }),
                Some(Err(e)) => Err(e.clone()),
                None => Err(FetchError::Timeout {
                    url: source.url.clone(),
                    timeout: source.timeout,
                }),
            }
        }
    }

    fn rss(items: &[(&str, &str, &str)]) -> String {
        let mut s = String::from("<rss><channel>");
        for (title, link, date) in items {
            s.push_str(&format!(
                "<item><title>{title}</title><link>{link}</link><pubDate>{date}</pubDate></item>"
            ));
        }
        s.push_str("</channel></rss>");
        s
    }

    fn src(url: &str) -> SourceConfig {
        SourceConfig::new(url, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn all_sources_failing_gives_empty_result_with_error() {
        let client = MapClient(HashMap::from([(
            "https://a.test".to_string(),
            Err(FetchError::Status {
                url: "https://a.test".into(),
                status: 500,
            }),
        )]));
        let agg = Aggregator::with_client(
            vec![src("https://a.test"), src("https://b.test")],
            Arc::new(client),
        );

        let out = agg.fetch().await;
        assert!(out.is_empty());
        // b.test came last in source order and timed out.
        let err = out.meta.last_error.expect("error recorded");
        assert!(err.contains("timed out"), "{err}");
        assert!(err.contains("https://b.test"), "{err}");
        assert_eq!(agg.last_error(), Some(err));
        assert!(agg.last_fetch_time().is_some());
    }

    #[tokio::test]
    async fn successful_cycle_clears_previous_error() {
        let mut map = HashMap::new();
        map.insert(
            "https://a.test".to_string(),
            Ok(rss(&[("t", "https://x/1", "Sun, 01 Sep 2024 14:00:00 +0000")])),
        );
        let agg = Aggregator::with_client(vec![src("https://a.test")], Arc::new(MapClient(map)));
        agg.set_meta(FetchMeta {
            last_fetch: None,
            last_error: Some("stale".into()),
        });

        let out = agg.fetch().await;
        assert_eq!(out.len(), 1);
        assert_eq!(out.meta.last_error, None);
        assert_eq!(agg.last_error(), None);
    }

    #[tokio::test]
    async fn concurrent_mode_matches_sequential() {
        let mut map = HashMap::new();
        map.insert(
            "https://a.test".to_string(),
            Ok(rss(&[
                ("A1", "https://x/1", "Sun, 01 Sep 2024 14:00:00 +0000"),
                ("A2", "https://x/2", ""),
            ])),
        );
        map.insert(
            "https://b.test".to_string(),
            Ok(rss(&[
                ("B1", "https://x/1", "Sun, 01 Sep 2024 14:00:00 +0000"),
                ("B3", "https://x/3", "Mon, 02 Sep 2024 08:00:00 +0000"),
            ])),
        );
        let client: Arc<dyn SourceClient> = Arc::new(MapClient(map));
        let sources = vec![src("https://a.test"), src("https://b.test")];

        let seq = Aggregator::with_client(sources.clone(), client.clone()).fetch().await;
        let conc = Aggregator::with_client(sources, client)
            .fetch_mode(FetchMode::Concurrent)
            .fetch()
            .await;

        assert_eq!(seq.items, conc.items);
        let titles: Vec<&str> = seq.items.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["B3", "A1", "A2"]);
    }

    #[tokio::test]
    async fn max_items_caps_result() {
        let mut map = HashMap::new();
        map.insert(
            "https://a.test".to_string(),
            Ok(rss(&[
                ("1", "https://x/1", ""),
                ("2", "https://x/2", ""),
                ("3", "https://x/3", ""),
            ])),
        );
        let agg = Aggregator::with_client(vec![src("https://a.test")], Arc::new(MapClient(map)))
            .max_items(2);
        assert_eq!(agg.fetch().await.len(), 2);
    }
}
