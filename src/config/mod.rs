// src/config/mod.rs
//! Startup configuration: source list, timeouts, cache TTLs, sample data dir.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::standings::{DEFAULT_CONSTRUCTORS_URL, DEFAULT_DRIVERS_URL};
use crate::ingest::types::{FetchMode, SourceConfig};

pub const ENV_CONFIG_PATH: &str = "PITWALL_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/pitwall.toml";
pub const DEFAULT_JSON_PATH: &str = "config/pitwall.json";

const DEFAULT_NEWS_TIMEOUT_SECS: u64 = 6;
const DEFAULT_STANDINGS_TIMEOUT_SECS: u64 = 8;
const DEFAULT_TTL_SECS: u64 = 120;

fn default_feeds() -> Vec<SourceEntry> {
    [
        "https://www.planetf1.com/feed/",
        "https://www.autosport.com/rss/feed/f1",
        "https://www.motorsport.com/rss/f1/news/",
    ]
    .into_iter()
    .map(|u| SourceEntry::Url(u.to_string()))
    .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub news: NewsConfig,
    pub standings: StandingsConfig,
    pub server: ServerConfig,
}

/// A feed URL, optionally with its own timeout.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SourceEntry {
    Url(String),
    Detailed {
        url: String,
        timeout_secs: Option<u64>,
    },
}

impl SourceEntry {
    pub fn url(&self) -> &str {
        match self {
            SourceEntry::Url(u) => u,
            SourceEntry::Detailed { url, .. } => url,
        }
    }

    fn timeout_secs(&self) -> Option<u64> {
        match self {
            SourceEntry::Url(_) => None,
            SourceEntry::Detailed { timeout_secs, .. } => *timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub sources: Vec<SourceEntry>,
    /// Applied to sources without their own `timeout_secs`.
    pub timeout_secs: u64,
    pub max_items: usize,
    pub cache_ttl_secs: u64,
    pub fetch_mode: FetchMode,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            sources: default_feeds(),
            timeout_secs: DEFAULT_NEWS_TIMEOUT_SECS,
            max_items: crate::ingest::aggregator::DEFAULT_MAX_ITEMS,
            cache_ttl_secs: DEFAULT_TTL_SECS,
            fetch_mode: FetchMode::Sequential,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StandingsConfig {
    pub drivers_url: String,
    pub constructors_url: String,
    pub timeout_secs: u64,
    pub cache_ttl_secs: u64,
}

impl Default for StandingsConfig {
    fn default() -> Self {
        Self {
            drivers_url: DEFAULT_DRIVERS_URL.to_string(),
            constructors_url: DEFAULT_CONSTRUCTORS_URL.to_string(),
            timeout_secs: DEFAULT_STANDINGS_TIMEOUT_SECS,
            cache_ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory holding `sample_news.json` / `sample_standings.json`.
    pub sample_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            sample_dir: Some(PathBuf::from("data")),
        }
    }
}

impl AppConfig {
    /// Load from an explicit path. TOML or JSON, chosen by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = match ext.as_str() {
            "json" => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        };
        cfg.with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load using env var + fallbacks:
    /// 1) $PITWALL_CONFIG_PATH
    /// 2) config/pitwall.toml
    /// 3) config/pitwall.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
        }
        let toml_p = PathBuf::from(DEFAULT_TOML_PATH);
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from(DEFAULT_JSON_PATH);
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default())
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s)?;
        Ok(cfg.sanitized())
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = serde_json::from_str(s)?;
        Ok(cfg.sanitized())
    }

    /// Drop blank URLs, collapse duplicates (first position wins), replace
    /// zero timeouts with defaults.
    fn sanitized(mut self) -> Self {
        let mut seen = HashSet::new();
        let mut sources = Vec::with_capacity(self.news.sources.len());
        for entry in self.news.sources {
            let url = entry.url().trim().to_string();
            if url.is_empty() || !seen.insert(url.clone()) {
                continue;
            }
            sources.push(match entry {
                SourceEntry::Url(_) => SourceEntry::Url(url),
                SourceEntry::Detailed { timeout_secs, .. } => SourceEntry::Detailed {
                    url,
                    timeout_secs: timeout_secs.filter(|t| *t > 0),
                },
            });
        }
        self.news.sources = sources;

        if self.news.timeout_secs == 0 {
            self.news.timeout_secs = DEFAULT_NEWS_TIMEOUT_SECS;
        }
        if self.standings.timeout_secs == 0 {
            self.standings.timeout_secs = DEFAULT_STANDINGS_TIMEOUT_SECS;
        }
        self
    }

    /// Source list with per-source timeouts resolved.
    pub fn news_sources(&self) -> Vec<SourceConfig> {
        self.news
            .sources
            .iter()
            .map(|e| {
                let secs = e.timeout_secs().unwrap_or(self.news.timeout_secs);
                SourceConfig::new(e.url(), Duration::from_secs(secs))
            })
            .collect()
    }

    pub fn news_ttl(&self) -> Duration {
        Duration::from_secs(self.news.cache_ttl_secs)
    }

    pub fn standings_ttl(&self) -> Duration {
        Duration::from_secs(self.standings.cache_ttl_secs)
    }

    pub fn standings_timeout(&self) -> Duration {
        Duration::from_secs(self.standings.timeout_secs)
    }
}
