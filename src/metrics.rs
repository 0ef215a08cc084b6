use anyhow::Context;
use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static GLOBAL: OnceCell<Metrics> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder and publish the cache TTLs.
    /// Fails if a recorder is already installed.
    pub fn init(news_ttl_ms: u64, standings_ttl_ms: u64) -> anyhow::Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        crate::ingest::aggregator::ensure_metrics_described();
        gauge!("feed_cache_ttl_ms", "key" => "news").set(news_ttl_ms as f64);
        gauge!("feed_cache_ttl_ms", "key" => "standings").set(standings_ttl_ms as f64);

        Ok(Self { handle })
    }

    /// Install once per process; later calls reuse the first recorder.
    pub fn global(news_ttl_ms: u64, standings_ttl_ms: u64) -> anyhow::Result<&'static Self> {
        GLOBAL.get_or_try_init(|| Self::init(news_ttl_ms, standings_ttl_ms))
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
