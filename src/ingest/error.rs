//! Per-source error types. Neither is fatal to a fetch cycle.

use std::time::Duration;

use thiserror::Error;

/// A single source request did not yield a usable body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connect + read did not finish within the source timeout.
    #[error("timed out after {timeout:?} fetching {url}")]
    Timeout { url: String, timeout: Duration },

    /// The source answered with something other than 200.
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    /// DNS, connection, TLS or body read failure.
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Timeout { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Network { url, .. } => url,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout { .. } => "timeout",
            FetchError::Status { .. } => "status",
            FetchError::Network { .. } => "network",
        }
    }
}

/// A body arrived but could not be read as any supported format.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed feed markup: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("malformed standings json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is missing {0}")]
    Shape(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_source() {
        let e = FetchError::Status {
            url: "https://feed.test/rss".into(),
            status: 503,
        };
        assert_eq!(e.to_string(), "unexpected status 503 from https://feed.test/rss");
        assert_eq!(e.kind(), "status");
        assert_eq!(e.url(), "https://feed.test/rss");
    }
}
