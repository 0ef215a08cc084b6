use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::cache::TtlCache;
use crate::config::AppConfig;
use crate::ingest::standings::{ConstructorStanding, DriverStanding};
use crate::ingest::{
    AggregationResult, Aggregator, FetchMeta, HttpSourceClient, SourceClient, SourceConfig,
    StandingsFetcher, StandingsResult,
};

pub const NEWS_KEY: &str = "news";
pub const STANDINGS_KEY: &str = "standings";

const SAMPLE_NEWS_FILE: &str = "sample_news.json";
const SAMPLE_STANDINGS_FILE: &str = "sample_standings.json";

/// Process-wide service state: loaders plus one cache per resource type.
/// Built once at startup and cloned (cheaply) into every handler.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub standings: Arc<StandingsFetcher>,
    pub news_cache: Arc<TtlCache<&'static str, Arc<AggregationResult>>>,
    pub standings_cache: Arc<TtlCache<&'static str, Arc<StandingsResult>>>,
    pub sample_dir: Option<PathBuf>,
}

impl AppState {
    /// Both loaders share one HTTP client (and its connection pool).
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let client: Arc<dyn SourceClient> = Arc::new(HttpSourceClient::new()?);
        let aggregator = Aggregator::with_client(cfg.news_sources(), client.clone())
            .max_items(cfg.news.max_items)
            .fetch_mode(cfg.news.fetch_mode);
        let timeout = cfg.standings_timeout();
        let standings = StandingsFetcher::with_client(
            SourceConfig::new(&cfg.standings.drivers_url, timeout),
            SourceConfig::new(&cfg.standings.constructors_url, timeout),
            client,
        );
        Ok(Self::new(aggregator, standings, cfg))
    }

    /// Wire caller-built loaders (tests use in-memory source clients).
    pub fn new(aggregator: Aggregator, standings: StandingsFetcher, cfg: &AppConfig) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            standings: Arc::new(standings),
            news_cache: Arc::new(TtlCache::new(cfg.news_ttl())),
            standings_cache: Arc::new(TtlCache::new(cfg.standings_ttl())),
            sample_dir: cfg.server.sample_dir.clone(),
        }
    }

    pub async fn news(&self) -> Arc<AggregationResult> {
        let agg = self.aggregator.clone();
        self.news_cache
            .get_or_load(NEWS_KEY, || async move { Arc::new(agg.fetch().await) })
            .await
    }

    pub async fn standings(&self) -> Arc<StandingsResult> {
        let fetcher = self.standings.clone();
        self.standings_cache
            .get_or_load(STANDINGS_KEY, || async move { Arc::new(fetcher.fetch().await) })
            .await
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/news", get(api_news))
        .route("/api/standings", get(api_standings))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaOut {
    pub last_fetch: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sample_used: Option<bool>,
}

impl From<&FetchMeta> for MetaOut {
    fn from(m: &FetchMeta) -> Self {
        Self {
            last_fetch: m.last_fetch,
            last_error: m.last_error.clone(),
            sample_used: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewsOut {
    /// Live records, or the sample file's items verbatim.
    pub items: serde_json::Value,
    pub meta: MetaOut,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StandingsData {
    #[serde(default)]
    pub drivers: Vec<DriverStanding>,
    #[serde(default)]
    pub constructors: Vec<ConstructorStanding>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StandingsOut {
    pub data: StandingsData,
    pub meta: MetaOut,
}

async fn api_news(State(state): State<AppState>) -> Json<NewsOut> {
    tracing::info!(target: "api", "request /api/news");
    let data = state.news().await;
    let mut meta = MetaOut::from(&data.meta);

    // An empty live result may be replaced by static sample content.
    if data.is_empty() {
        if let Some(items) = load_sample_news(state.sample_dir.as_deref()).await {
            meta.sample_used = Some(true);
            return Json(NewsOut { items, meta });
        }
    }

    let items = serde_json::to_value(&data.items).unwrap_or_default();
    Json(NewsOut { items, meta })
}

async fn api_standings(State(state): State<AppState>) -> Json<StandingsOut> {
    tracing::info!(target: "api", "request /api/standings");
    let data = state.standings().await;
    let mut meta = MetaOut::from(&data.meta);

    if data.is_empty() {
        if let Some(sample) = load_sample_standings(state.sample_dir.as_deref()).await {
            meta.sample_used = Some(true);
            return Json(StandingsOut { data: sample, meta });
        }
    }

    Json(StandingsOut {
        data: StandingsData {
            drivers: data.drivers.clone(),
            constructors: data.constructors.clone(),
        },
        meta,
    })
}

async fn read_sample(dir: Option<&Path>, file: &str) -> Option<String> {
    let path = dir?.join(file);
    match tokio::fs::read_to_string(&path).await {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::debug!(target: "api", path = %path.display(), error = %e, "no sample data");
            None
        }
    }
}

async fn load_sample_news(dir: Option<&Path>) -> Option<serde_json::Value> {
    #[derive(Deserialize)]
    struct Sample {
        #[serde(default)]
        items: serde_json::Value,
    }
    let raw = read_sample(dir, SAMPLE_NEWS_FILE).await?;
    match serde_json::from_str::<Sample>(&raw) {
        Ok(s) if s.items.is_array() => Some(s.items),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(target: "api", error = %e, "sample news unreadable");
            None
        }
    }
}

async fn load_sample_standings(dir: Option<&Path>) -> Option<StandingsData> {
    let raw = read_sample(dir, SAMPLE_STANDINGS_FILE).await?;
    serde_json::from_str(&raw)
        .map_err(|e| tracing::warn!(target: "api", error = %e, "sample standings unreadable"))
        .ok()
}
