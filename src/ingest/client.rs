// src/ingest/client.rs
use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;

use crate::ingest::error::FetchError;
use crate::ingest::types::{RawPayload, SourceConfig};

const USER_AGENT: &str = "pitwall-feed/0.1 (+https://github.com/pitwall-feed/pitwall-feed)";
const ACCEPT: &str = "application/rss+xml, application/atom+xml, application/xml, text/xml, application/json;q=0.9, */*;q=0.5";

/// One network fetch of one source. Exactly one attempt; the next cache
/// expiry is the retry.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn fetch(&self, source: &SourceConfig) -> Result<RawPayload, FetchError>;
}

/// Production client backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct HttpSourceClient {
    http: reqwest::Client,
}

impl HttpSourceClient {
    /// Fails when the TLS backend cannot be initialised.
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("building http client")?;
        Ok(Self { http })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

fn classify(source: &SourceConfig, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: source.url.clone(),
            timeout: source.timeout,
        }
    } else {
        FetchError::Network {
            url: source.url.clone(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn fetch(&self, source: &SourceConfig) -> Result<RawPayload, FetchError> {
        // The per-request timeout spans connect, headers and body.
        let resp = self
            .http
            .get(&source.url)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .timeout(source.timeout)
            .send()
            .await
            .map_err(|e| classify(source, e))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: source.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = resp.bytes().await.map_err(|e| classify(source, e))?;
        tracing::debug!(
            target: "ingest",
            url = %source.url,
            bytes = body.len(),
            "source fetched"
        );

        Ok(RawPayload {
            body: body.to_vec(),
            status: status.as_u16(),
        })
    }
}
