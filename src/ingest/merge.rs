// src/ingest/merge.rs
use std::collections::HashSet;

use metrics::counter;

use crate::ingest::types::NormalizedRecord;

/// Collects records from every source of a cycle in accumulation order.
#[derive(Debug, Default)]
pub struct Merger {
    records: Vec<NormalizedRecord>,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, records: Vec<NormalizedRecord>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn finalize(self, max_items: usize) -> Vec<NormalizedRecord> {
        finalize(self.records, max_items)
    }
}

/// Dedupe by link (first occurrence wins, empty links dropped), stable-sort
/// newest first with unknown dates last, then cap at `max_items`.
pub fn finalize(records: Vec<NormalizedRecord>, max_items: usize) -> Vec<NormalizedRecord> {
    let total = records.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(total);
    let mut keep = Vec::with_capacity(total);
    let mut dropped = 0usize;

    for rec in records {
        if rec.link.is_empty() || !seen.insert(rec.link.clone()) {
            dropped += 1;
            continue;
        }
        keep.push(rec);
    }

    // `sort_by` is stable: equal timestamps (including all the zeros) keep
    // their accumulation order. Timestamps are never negative.
    keep.sort_by(|a, b| b.published_ts.cmp(&a.published_ts));
    keep.truncate(max_items);

    counter!("feed_records_deduped_total").increment(dropped as u64);
    keep
}
