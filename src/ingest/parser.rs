// src/ingest/parser.rs
//! Payload parsing: feed markup (RSS item lists, Atom entries) and standings
//! tables (Ergast-style JSON). Every public entry point is total: malformed
//! input yields an empty sequence and a debug log line, never an error.

use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::error::ParseError;
use crate::ingest::standings::{ConstructorStanding, DriverStanding};
use crate::ingest::types::NormalizedRecord;

// ------------------------------------------------------------
// Feed markup
// ------------------------------------------------------------

/// RSS 2.0 nests items under `channel`; RSS 1.0 (RDF) puts them at the root.
#[derive(Debug, Deserialize)]
struct RssDoc {
    channel: Option<Channel>,
    #[serde(default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    item: Vec<Item>,
}

/// Fields are matched by local name, so namespaced extensions such as
/// `media:title` or `atom:link` land in the same list as the plain element.
/// The first non-empty value wins.
#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    link: Vec<String>,
    #[serde(default)]
    description: Vec<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    title: Vec<AtomText>,
    #[serde(default)]
    link: Vec<AtomLink>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
    updated: Option<String>,
    published: Option<String>,
}

/// Atom text constructs carry a `type` attribute, so read the text node explicitly.
#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Fields pulled out of one raw item before normalization.
struct RawItem {
    title: String,
    link: String,
    summary: String,
    published: String,
}

fn text_of(t: Option<AtomText>) -> String {
    t.map(|t| t.value).unwrap_or_default()
}

fn first_non_empty(values: Vec<String>) -> String {
    values
        .into_iter()
        .find(|v| !v.trim().is_empty())
        .unwrap_or_default()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

impl From<Item> for RawItem {
    fn from(it: Item) -> Self {
        Self {
            title: first_non_empty(it.title),
            link: first_non_empty(it.link).trim().to_string(),
            summary: first_non_empty(it.description),
            published: it.pub_date.unwrap_or_default(),
        }
    }
}

impl From<Entry> for RawItem {
    fn from(e: Entry) -> Self {
        let link = e
            .link
            .iter()
            .find(|l| !l.href.is_empty() && l.rel.as_deref().map_or(true, |r| r == "alternate"))
            .or_else(|| e.link.iter().find(|l| !l.href.is_empty()))
            .map(|l| l.href.trim().to_string())
            .unwrap_or_default();
        let summary = non_empty(text_of(e.summary)).unwrap_or_else(|| text_of(e.content));
        let published = e
            .updated
            .and_then(non_empty)
            .or_else(|| e.published)
            .unwrap_or_default();
        Self {
            title: first_non_empty(e.title.into_iter().map(|t| t.value).collect()),
            link,
            summary,
            published,
        }
    }
}

/// Item-list parse first; Atom entries only when the item list came up empty.
fn parse_raw_items(xml: &str) -> Result<Vec<RawItem>, ParseError> {
    let rss_err = match from_str::<RssDoc>(xml) {
        Ok(doc) => {
            let mut items: Vec<RawItem> = Vec::new();
            if let Some(ch) = doc.channel {
                items.extend(ch.item.into_iter().map(RawItem::from));
            }
            items.extend(doc.item.into_iter().map(RawItem::from));
            if !items.is_empty() {
                return Ok(items);
            }
            None
        }
        Err(e) => Some(e),
    };

    // Prefer the item-list failure; it is the likelier description of the problem.
    match (from_str::<AtomFeed>(xml), rss_err) {
        (Ok(feed), Some(rss_err)) if feed.entry.is_empty() => Err(rss_err.into()),
        (Ok(feed), _) => Ok(feed.entry.into_iter().map(RawItem::from).collect()),
        (Err(atom_err), rss_err) => Err(rss_err.unwrap_or(atom_err).into()),
    }
}

/// Convert a feed date to unix seconds. RFC 2822 (`pubDate`) first, then
/// RFC 3339 (Atom `updated`/`published`). Unknown or pre-epoch dates give 0.
pub fn published_timestamp(raw: &str) -> i64 {
    let s = raw.trim();
    if s.is_empty() {
        return 0;
    }
    OffsetDateTime::parse(s, &Rfc2822)
        .ok()
        .map(|dt| dt.unix_timestamp())
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.timestamp())
        })
        .filter(|ts| *ts > 0)
        .unwrap_or(0)
}

/// Fallible variant of [`parse_feed`], for callers that want the reason.
pub fn try_parse_feed(body: &[u8], source_id: &str) -> Result<Vec<NormalizedRecord>, ParseError> {
    let text = String::from_utf8_lossy(body);
    let xml = scrub_html_entities_for_xml(text.trim_start_matches('\u{feff}'));
    let raw = parse_raw_items(&xml)?;

    Ok(raw
        .into_iter()
        .map(|it| NormalizedRecord {
            published_ts: published_timestamp(&it.published),
            title: it.title.trim().to_string(),
            link: it.link,
            summary: it.summary.trim().to_string(),
            published_raw: it.published.trim().to_string(),
            source_id: source_id.to_string(),
        })
        .collect())
}

/// Parse one feed body into records tagged with `source_id`.
/// Malformed markup yields an empty vector.
pub fn parse_feed(body: &[u8], source_id: &str) -> Vec<NormalizedRecord> {
    let t0 = std::time::Instant::now();
    let out = match try_parse_feed(body, source_id) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(target: "ingest", source = source_id, error = %e, "feed parse failed");
            counter!("feed_parse_errors_total").increment(1);
            Vec::new()
        }
    };

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("feed_parse_ms").record(ms);
    counter!("feed_records_parsed_total").increment(out.len() as u64);
    out
}

/// Feeds routinely embed HTML named entities that XML does not define.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

// ------------------------------------------------------------
// Standings tables
// ------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "MRData")]
    mr_data: MrData,
}

#[derive(Debug, Deserialize)]
struct MrData {
    #[serde(rename = "StandingsTable")]
    standings_table: StandingsTable,
}

#[derive(Debug, Deserialize)]
struct StandingsTable {
    #[serde(rename = "StandingsLists", default)]
    lists: Vec<StandingsList>,
}

#[derive(Debug, Deserialize)]
struct StandingsList {
    #[serde(rename = "DriverStandings", default)]
    drivers: Vec<RawDriverStanding>,
    #[serde(rename = "ConstructorStandings", default)]
    constructors: Vec<RawConstructorStanding>,
}

#[derive(Debug, Deserialize)]
struct RawDriverStanding {
    #[serde(default)]
    position: Option<String>,
    #[serde(rename = "positionText", default)]
    position_text: Option<String>,
    #[serde(default)]
    points: Option<String>,
    #[serde(default)]
    wins: Option<String>,
    #[serde(rename = "Driver")]
    driver: RawDriver,
    #[serde(rename = "Constructors", default)]
    constructors: Vec<RawConstructor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawDriver {
    driver_id: String,
    code: String,
    given_name: String,
    family_name: String,
    nationality: String,
}

#[derive(Debug, Deserialize)]
struct RawConstructorStanding {
    #[serde(default)]
    position: Option<String>,
    #[serde(rename = "positionText", default)]
    position_text: Option<String>,
    #[serde(default)]
    points: Option<String>,
    #[serde(default)]
    wins: Option<String>,
    #[serde(rename = "Constructor")]
    constructor: RawConstructor,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawConstructor {
    constructor_id: String,
    name: String,
    nationality: String,
}

fn first_list(body: &[u8]) -> Result<StandingsList, ParseError> {
    let env: Envelope = serde_json::from_slice(body)?;
    env.mr_data
        .standings_table
        .lists
        .into_iter()
        .next()
        .ok_or(ParseError::Shape("StandingsLists[0]"))
}

// Unclassified finishers carry no `position`, only `positionText` ("-", "D", ...).
fn position_of(position: Option<String>, text: Option<String>) -> String {
    position.or(text).unwrap_or_default()
}

pub fn try_parse_driver_standings(body: &[u8]) -> Result<Vec<DriverStanding>, ParseError> {
    let list = first_list(body)?;
    Ok(list
        .drivers
        .into_iter()
        .map(|d| DriverStanding {
            position: position_of(d.position, d.position_text),
            points: d.points.unwrap_or_default(),
            wins: d.wins.unwrap_or_default(),
            driver_id: d.driver.driver_id,
            code: d.driver.code,
            given_name: d.driver.given_name,
            family_name: d.driver.family_name,
            nationality: d.driver.nationality,
            // Mid-season transfers list every team; the last one is current.
            constructor: d
                .constructors
                .into_iter()
                .last()
                .map(|c| c.name)
                .unwrap_or_default(),
        })
        .collect())
}

pub fn try_parse_constructor_standings(
    body: &[u8],
) -> Result<Vec<ConstructorStanding>, ParseError> {
    let list = first_list(body)?;
    Ok(list
        .constructors
        .into_iter()
        .map(|c| ConstructorStanding {
            position: position_of(c.position, c.position_text),
            points: c.points.unwrap_or_default(),
            wins: c.wins.unwrap_or_default(),
            constructor_id: c.constructor.constructor_id,
            name: c.constructor.name,
            nationality: c.constructor.nationality,
        })
        .collect())
}

/// Driver table from an Ergast-style envelope; empty on any shape mismatch.
pub fn parse_driver_standings(body: &[u8]) -> Vec<DriverStanding> {
    try_parse_driver_standings(body).unwrap_or_else(|e| {
        tracing::debug!(target: "ingest", error = %e, "driver standings parse failed");
        counter!("feed_parse_errors_total").increment(1);
        Vec::new()
    })
}

/// Constructor table from an Ergast-style envelope; empty on any shape mismatch.
pub fn parse_constructor_standings(body: &[u8]) -> Vec<ConstructorStanding> {
    try_parse_constructor_standings(body).unwrap_or_else(|e| {
        tracing::debug!(target: "ingest", error = %e, "constructor standings parse failed");
        counter!("feed_parse_errors_total").increment(1);
        Vec::new()
    })
}
