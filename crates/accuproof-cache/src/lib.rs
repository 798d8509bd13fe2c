//! accuproof-cache
//!
//! Keyed TTL memoization of RPC requests (spec.md C2 / §4.1). A single
//! reader/writer lock guards the map: reads take a shared lock, inserts
//! and eviction take an exclusive lock, and a background sweeper takes an
//! exclusive lock on a fixed interval to drop expired entries.

use accuproof_core::canonical_json;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 1024;
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct CacheEntry {
    response: Value,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > self.ttl
    }
}

struct RawCacheEntry {
    bytes: Vec<u8>,
    inserted_at: Instant,
    ttl: Duration,
}

impl RawCacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > self.ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub hit_rate: f64,
}

/// Process-wide keyed cache over `(scope, query) -> response`.
///
/// Maintains two maps over the same key space: `inner` for the parsed
/// `query` path and `raw` for the byte-exact `query_raw` path used by
/// artifact recording, so a repeat fetch of the same scope/query is a
/// cache hit regardless of which path the caller takes.
pub struct QueryCache {
    inner: RwLock<HashMap<String, CacheEntry>>,
    raw: RwLock<HashMap<String, RawCacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    capacity: usize,
    default_ttl: Duration,
}

impl QueryCache {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            raw: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            capacity,
            default_ttl,
        }
    }

    /// The single global cache instance, lazily constructed with the
    /// spec's defaults (capacity 1024, TTL 5 minutes). Shared via `Arc` so
    /// callers (e.g. `CachedRpcClient`) can hold it alongside other
    /// `Arc`-owned collaborators without a second cache instance.
    pub fn global() -> Arc<QueryCache> {
        static GLOBAL: once_cell::sync::Lazy<Arc<QueryCache>> =
            once_cell::sync::Lazy::new(|| Arc::new(QueryCache::new(DEFAULT_CAPACITY, DEFAULT_TTL)));
        GLOBAL.clone()
    }

    fn key_for(scope: &str, query: &Value) -> String {
        let mut buf = scope.as_bytes().to_vec();
        buf.extend_from_slice(canonical_json(query).as_bytes());
        accuproof_core::Hash32::sha256(&buf).to_hex()
    }

    /// `query.queryType ∈ {"chain", "message", undefined}` is cacheable;
    /// raw/byte queries bypass the cache (spec.md §4.1 `should_cache`).
    pub fn should_cache(query: &Value) -> bool {
        match query.get("queryType").and_then(Value::as_str) {
            None => true,
            Some("chain") | Some("message") => true,
            Some(_) => false,
        }
    }

    fn is_response_cacheable(response: &Value) -> bool {
        if response.is_null() {
            return false;
        }
        if let Some(err) = response.get("error") {
            if !err.is_null() {
                return false;
            }
        }
        match response {
            Value::Object(m) => !m.is_empty(),
            Value::Array(a) => !a.is_empty(),
            _ => true,
        }
    }

    /// Returns the cached response, or `None` on miss or expiry (expired
    /// entries are reported as misses but not deleted — the sweeper owns
    /// deletion).
    pub fn get(&self, scope: &str, query: &Value) -> Option<Value> {
        let key = Self::key_for(scope, query);
        let guard = self.inner.read().expect("cache lock poisoned");
        let now = Instant::now();
        match guard.get(&key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.response.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a response, refusing error-bearing or empty responses, and
    /// evicting the single oldest entry if at capacity.
    pub fn set(&self, scope: &str, query: &Value, response: &Value, ttl: Option<Duration>) {
        if !Self::is_response_cacheable(response) {
            debug!(scope, "refusing to cache error/empty response");
            return;
        }
        let key = Self::key_for(scope, query);
        let mut guard = self.inner.write().expect("cache lock poisoned");
        if guard.len() >= self.capacity && !guard.contains_key(&key) {
            if let Some(oldest_key) = guard
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone())
            {
                guard.remove(&oldest_key);
            }
        }
        guard.insert(
            key,
            CacheEntry {
                response: response.clone(),
                inserted_at: Instant::now(),
                ttl: ttl.unwrap_or(self.default_ttl),
            },
        );
    }

    /// Byte-exact counterpart to `get`, used by `query_raw` callers
    /// (artifact recording) so a repeated raw fetch of the same
    /// scope/query reuses the original wire bytes instead of re-hitting
    /// the node.
    pub fn get_raw(&self, scope: &str, query: &Value) -> Option<Vec<u8>> {
        let key = Self::key_for(scope, query);
        let guard = self.raw.read().expect("cache lock poisoned");
        let now = Instant::now();
        match guard.get(&key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.bytes.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert raw response bytes under `(scope, query)`, accepting
    /// `parsed` only to run the same error/empty cacheability check
    /// `set` applies to the parsed path.
    pub fn set_raw(&self, scope: &str, query: &Value, bytes: &[u8], parsed: &Value, ttl: Option<Duration>) {
        if !Self::is_response_cacheable(parsed) {
            debug!(scope, "refusing to cache error/empty raw response");
            return;
        }
        let key = Self::key_for(scope, query);
        let mut guard = self.raw.write().expect("cache lock poisoned");
        if guard.len() >= self.capacity && !guard.contains_key(&key) {
            if let Some(oldest_key) = guard
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone())
            {
                guard.remove(&oldest_key);
            }
        }
        guard.insert(
            key,
            RawCacheEntry {
                bytes: bytes.to_vec(),
                inserted_at: Instant::now(),
                ttl: ttl.unwrap_or(self.default_ttl),
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };
        let size = self.inner.read().expect("cache lock poisoned").len()
            + self.raw.read().expect("cache lock poisoned").len();
        CacheStats {
            hits,
            misses,
            size,
            hit_rate,
        }
    }

    pub fn clear(&self) {
        let mut guard = self.inner.write().expect("cache lock poisoned");
        guard.clear();
        self.raw.write().expect("cache lock poisoned").clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Spawn the background sweeper that removes expired entries on a
    /// fixed interval. The returned handle should be aborted when the
    /// process shuts down.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let now = Instant::now();
                let mut guard = self.inner.write().expect("cache lock poisoned");
                let before = guard.len();
                guard.retain(|_, entry| !entry.is_expired(now));
                let removed = before - guard.len();
                drop(guard);

                let mut raw_guard = self.raw.write().expect("cache lock poisoned");
                let raw_before = raw_guard.len();
                raw_guard.retain(|_, entry| !entry.is_expired(now));
                let raw_removed = raw_before - raw_guard.len();

                if removed + raw_removed > 0 {
                    debug!(
                        removed = removed + raw_removed,
                        remaining = raw_guard.len(),
                        "cache sweeper evicted expired entries"
                    );
                }
            }
        })
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}
