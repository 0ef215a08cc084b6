// src/ingest/standings.rs
//! Championship tables loader (drivers + constructors).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::ingest::client::{HttpSourceClient, SourceClient};
use crate::ingest::parser::{parse_constructor_standings, parse_driver_standings};
use crate::ingest::types::{FetchMeta, SourceConfig};

pub const DEFAULT_DRIVERS_URL: &str = "https://api.jolpi.ca/ergast/f1/current/driverStandings.json";
pub const DEFAULT_CONSTRUCTORS_URL: &str =
    "https://api.jolpi.ca/ergast/f1/current/constructorStandings.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DriverStanding {
    pub position: String,
    pub points: String,
    pub wins: String,
    pub driver_id: String,
    pub code: String,
    pub given_name: String,
    pub family_name: String,
    pub nationality: String,
    pub constructor: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConstructorStanding {
    pub position: String,
    pub points: String,
    pub wins: String,
    pub constructor_id: String,
    pub name: String,
    pub nationality: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StandingsResult {
    pub drivers: Vec<DriverStanding>,
    pub constructors: Vec<ConstructorStanding>,
    #[serde(skip)]
    pub meta: FetchMeta,
}

impl StandingsResult {
    /// Nothing to show: both tables came back empty.
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty() && self.constructors.is_empty()
    }
}

pub struct StandingsFetcher {
    drivers: SourceConfig,
    constructors: SourceConfig,
    client: Arc<dyn SourceClient>,
    meta: Mutex<FetchMeta>,
}

impl StandingsFetcher {
    pub fn new(
        drivers_url: &str,
        constructors_url: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self::with_client(
            SourceConfig::new(drivers_url, timeout),
            SourceConfig::new(constructors_url, timeout),
            Arc::new(HttpSourceClient::new()?),
        ))
    }

    pub fn with_client(
        drivers: SourceConfig,
        constructors: SourceConfig,
        client: Arc<dyn SourceClient>,
    ) -> Self {
        Self {
            drivers,
            constructors,
            client,
            meta: Mutex::new(FetchMeta::default()),
        }
    }

    /// Start of the most recent cycle, if any ran.
    pub fn last_fetch_time(&self) -> Option<chrono::DateTime<Utc>> {
        self.meta_snapshot().last_fetch
    }

    /// Last table failure of the most recent cycle.
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

    /// Fetch both tables. A failure on one table leaves it empty and is
    /// recorded; the other table is still fetched.
    pub async fn fetch(&self) -> StandingsResult {
        let started = Utc::now();
        self.set_meta(FetchMeta {
            last_fetch: Some(started),
            last_error: None,
        });
        let mut last_error = None;

        let drivers = match self.client.fetch(&self.drivers).await {
            Ok(p) => parse_driver_standings(&p.body),
            Err(e) => {
                tracing::warn!(target: "ingest", error = %e, "driver standings fetch failed");
                counter!("feed_source_errors_total", "kind" => e.kind()).increment(1);
                last_error = Some(e.to_string());
                Vec::new()
            }
        };

        let constructors = match self.client.fetch(&self.constructors).await {
            Ok(p) => parse_constructor_standings(&p.body),
            Err(e) => {
                tracing::warn!(target: "ingest", error = %e, "constructor standings fetch failed");
                counter!("feed_source_errors_total", "kind" => e.kind()).increment(1);
                last_error = Some(e.to_string());
                Vec::new()
            }
        };

        let meta = FetchMeta {
            last_fetch: Some(started),
            last_error,
        };
        self.set_meta(meta.clone());

        tracing::info!(
            target: "ingest",
            drivers = drivers.len(),
            constructors = constructors.len(),
            "standings fetch finished"
        );

        StandingsResult {
            drivers,
            constructors,
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::error::FetchError;
    use crate::ingest::types::RawPayload;
    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    /// Holds every request until the test hands out permits, then refuses it.
    struct Gated(Semaphore);

    #[async_trait]
    impl SourceClient for Gated {
        async fn fetch(&self, source: &SourceConfig) -> Result<RawPayload, FetchError> {
            if let Ok(permit) = self.0.acquire().await {
                permit.forget();
            }
            Err(FetchError::Network {
                url: source.url.clone(),
                reason: "refused".into(),
            })
        }
    }

    fn fetcher_with(client: Arc<dyn SourceClient>) -> StandingsFetcher {
        let t = Duration::from_secs(1);
        StandingsFetcher::with_client(
            SourceConfig::new("https://d.test", t),
            SourceConfig::new("https://c.test", t),
            client,
        )
    }

    #[tokio::test]
    async fn cycle_start_is_recorded_and_stale_error_cleared() {
        let gate = Arc::new(Gated(Semaphore::new(0)));
        let f = fetcher_with(gate.clone());
        f.set_meta(FetchMeta {
            last_fetch: None,
            last_error: Some("stale".into()),
        });

        let (out, mid) = tokio::join!(f.fetch(), async {
            // The cycle is parked on its first request here.
            let mid = f.meta_snapshot();
            gate.0.add_permits(2);
            mid
        });

        assert!(mid.last_fetch.is_some());
        assert_eq!(mid.last_error, None);
        assert_eq!(mid.last_fetch, out.meta.last_fetch);
        let err = out.meta.last_error.expect("table failure recorded");
        assert!(err.contains("https://c.test"), "{err}");
    }

    #[test]
    fn poisoned_meta_is_still_readable_and_writable() {
        let f = Arc::new(fetcher_with(Arc::new(Gated(Semaphore::new(0)))));
        let f2 = f.clone();
        let _ = std::thread::spawn(move || {
            let _g = f2.meta.lock().unwrap();
            panic!("poison the meta lock");
        })
        .join();
        assert!(f.meta.is_poisoned());

        f.set_meta(FetchMeta {
            last_fetch: None,
            last_error: Some("after poison".into()),
        });
        assert_eq!(f.last_error().as_deref(), Some("after poison"));
        assert_eq!(f.last_fetch_time(), None);
    }
}
