//! # TTL cache
//! Compute-once, serve-many store with absolute expiry.
//!
//! `get_or_load` returns a live value without calling the loader; on a miss
//! or an expired entry the caller runs the loader, stores the result with a
//! fresh timestamp and returns it. The map lock is held only for the
//! read-check and for the write-after-load, never while the loader runs, so
//! two callers that see the same expired key may both recompute it. The
//! later write wins.
//!
//! Time comes from `tokio::time::Instant`, which tests can pause and advance.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::Duration;

use metrics::counter;
use tokio::time::Instant;

pub const DEFAULT_TTL: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    inner: Mutex<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the live value for `key`, or run `loader`, store and return its output.
    ///
    /// The loader has no error channel: failures must already be folded into `V`.
    pub async fn get_or_load<F, Fut>(&self, key: K, loader: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(v) = self.lookup(&key) {
            counter!("feed_cache_hits_total", "key" => key_label(&key)).increment(1);
            tracing::debug!(target: "cache", key = ?key, "hit");
            return v;
        }

        counter!("feed_cache_misses_total", "key" => key_label(&key)).increment(1);
        tracing::debug!(target: "cache", key = ?key, "miss, loading");

        let value = loader().await;
        self.store(key, value.clone());
        value
    }

    /// Live value only; never loads.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.lookup(key)
    }

    /// Number of stored entries, live or expired.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let map = self.lock();
        map.get(key)
            .filter(|e| now.saturating_duration_since(e.stored_at) < self.ttl)
            .map(|e| e.value.clone())
    }

    fn store(&self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
        };
        self.lock().insert(key, entry);
    }

    // Entries are replaced whole, so a poisoned map is still consistent.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }
}

// String keys debug-print with quotes; labels read better without them.
fn key_label<K: Debug>(key: &K) -> String {
    format!("{key:?}").trim_matches('"').to_string()
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
