// tests/parser_formats.rs
//
// Feed payloads as real sources serve them: RSS 2.0, RSS 1.0 (RDF) and Atom,
// plus markup that must degrade to an empty result.

use pitwall_feed::ingest::parser::{parse_feed, try_parse_feed};

const RSS2: &str = include_str!("fixtures/rss2_planetf1.xml");
const RDF: &str = include_str!("fixtures/rss1_rdf.xml");
const ATOM: &str = include_str!("fixtures/atom_motorsport.xml");
const TRUNCATED: &str = include_str!("fixtures/truncated.xml");
const EXTENSIONS: &str = include_str!("fixtures/rss2_extensions.xml");

#[test]
fn rss2_channel_items_in_document_order() {
    let out = parse_feed(RSS2.as_bytes(), "https://www.planetf1.com/feed/");
    let links: Vec<&str> = out.iter().map(|r| r.link.as_str()).collect();
    assert_eq!(
        links,
        vec![
            "https://www.planetf1.com/news/norris-pole-monza",
            "https://www.planetf1.com/news/leclerc-wins-monza",
            "https://www.planetf1.com/news/paddock-notebook",
        ]
    );

    assert_eq!(out[0].published_ts, 1_725_095_700);
    assert_eq!(out[0].published_raw, "Sat, 31 Aug 2024 09:15:00 +0000");
    assert_eq!(out[0].summary, "<p>McLaren lock out the front row.</p>");
    assert_eq!(out[1].published_ts, 1_725_199_200);
    assert_eq!(out[1].summary, "A one-stop strategy pays off for Ferrari.");
    assert_eq!(out[2].published_ts, 0);
    assert!(out.iter().all(|r| r.source_id == "https://www.planetf1.com/feed/"));
}

#[test]
fn namespaced_item_children_do_not_drop_items() {
    let out = try_parse_feed(EXTENSIONS.as_bytes(), "autosport").expect("valid rss");
    assert_eq!(out.len(), 3);

    assert_eq!(out[0].title, "Hamilton quickest in FP2");
    assert_eq!(out[0].link, "https://autosport.example.test/f1/news/fp2");
    assert_eq!(out[0].summary, "Mercedes on top on Friday.");
    assert_eq!(out[0].published_ts, 1_725_039_900);

    // `media:title` after the plain title does not replace it.
    assert_eq!(out[1].title, "Sainz penalty confirmed");
    assert_eq!(out[1].link, "https://autosport.example.test/f1/news/sainz-penalty");

    assert_eq!(out[2].link, "https://autosport.example.test/f1/news/ver-setup");
    assert_eq!(out[2].published_ts, 1_725_193_800);
}

#[test]
fn rdf_items_live_at_the_root() {
    let out = parse_feed(RDF.as_bytes(), "rdf");
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].title, "Sprint format tweaks confirmed");
    assert_eq!(out[1].link, "https://f1.example.test/b");
    assert!(out.iter().all(|r| r.published_ts == 0));
}

#[test]
fn atom_entries_use_the_fallback_path() {
    let out = parse_feed(ATOM.as_bytes(), "atom");
    assert_eq!(out.len(), 3);

    // rel="alternate" wins over rel="self".
    assert_eq!(out[0].link, "https://motorsport.example.test/news/piastri-move");
    assert_eq!(out[0].title, "Piastri's first-lap move explained");
    assert_eq!(out[0].summary, "Turn one, lap one.");
    assert_eq!(out[0].published_ts, 1_725_199_200);

    // No `updated`: `published` is used, and `content` stands in for `summary`.
    assert_eq!(out[1].link, "https://motorsport.example.test/news/baku-upgrades");
    assert_eq!(out[1].summary, "Floor and sidepod changes.");
    assert_eq!(out[1].published_ts, 1_725_095_700);

    assert_eq!(out[2].published_raw, "");
    assert_eq!(out[2].published_ts, 0);
}

#[test]
fn malformed_payloads_yield_nothing() {
    assert!(parse_feed(TRUNCATED.as_bytes(), "t").is_empty());
    assert!(try_parse_feed(TRUNCATED.as_bytes(), "t").is_err());

    // A broken item list is reported even though the Atom pass finds nothing.
    let double_date = b"<rss><channel><item><title>x</title><link>https://x/1</link>\
<pubDate>Sun, 01 Sep 2024 14:00:00 +0000</pubDate><pubDate>Mon, 02 Sep 2024 08:00:00 +0000</pubDate>\
</item></channel></rss>";
    assert!(try_parse_feed(double_date, "d").is_err());
    assert!(parse_feed(double_date, "d").is_empty());

    // Well-formed but not a feed.
    assert!(parse_feed(b"<html><body><p>hello</p></body></html>", "h").is_empty());
    // Binary junk.
    assert!(parse_feed(&[0xff, 0xfe, 0x00, 0x13, 0x37], "b").is_empty());
}

#[test]
fn byte_order_mark_is_tolerated() {
    let mut body = "\u{feff}".as_bytes().to_vec();
    body.extend_from_slice(RSS2.as_bytes());
    assert_eq!(parse_feed(&body, "bom").len(), 3);
}
