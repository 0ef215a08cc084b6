// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod ingest;
pub mod metrics;

pub use crate::api::{router, AppState};
pub use crate::cache::TtlCache;
pub use crate::config::AppConfig;
pub use crate::ingest::{
    AggregationResult, Aggregator, FetchMeta, NormalizedRecord, StandingsFetcher,
    StandingsResult,
};

use axum::Router;

/// Full HTTP surface for `cfg`: API routes plus `/metrics`.
pub fn build_router(cfg: &AppConfig) -> anyhow::Result<Router> {
    let metrics = metrics::Metrics::global(
        cfg.news_ttl().as_millis() as u64,
        cfg.standings_ttl().as_millis() as u64,
    )?;
    let state = AppState::from_config(cfg)?;
    tracing::info!(
        sources = state.aggregator.sources().len(),
        news_ttl_s = cfg.news.cache_ttl_secs,
        standings_ttl_s = cfg.standings.cache_ttl_secs,
        "router built"
    );
    Ok(api::router(state).merge(metrics.router()))
}

/// Same router the binary serves, configured from env/config files.
pub fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::load_default()?;
    build_router(&cfg)
}
