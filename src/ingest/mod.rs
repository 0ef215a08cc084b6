// src/ingest/mod.rs
//! Fetch → parse → merge pipeline feeding the caches.
//!
//! - [`client`]: one bounded network fetch per source.
//! - [`parser`]: feed markup and standings tables into normalized records.
//! - [`merge`]: dedupe by link, newest first, capped.
//! - [`aggregator`]: the news loader; [`standings`]: the standings loader.

pub mod aggregator;
pub mod client;
pub mod error;
pub mod merge;
pub mod parser;
pub mod standings;
pub mod types;

pub use aggregator::Aggregator;
pub use client::{HttpSourceClient, SourceClient};
pub use error::{FetchError, ParseError};
pub use merge::{finalize, Merger};
pub use parser::{parse_feed, published_timestamp};
pub use standings::{StandingsFetcher, StandingsResult};
pub use types::{AggregationResult, FetchMeta, FetchMode, NormalizedRecord, SourceConfig};
