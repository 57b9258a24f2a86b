//! In-memory TTL response store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Serialize;

use crate::cache::clock::{Clock, SystemClock};
use crate::cache::key::CacheKey;
use crate::observability::metrics;

/// A stored response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub payload: Bytes,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    /// Valid iff `now < created_at + ttl`. A deadline past the clock's
    /// range never expires.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        self.expires_at().map_or(true, |deadline| now < deadline)
    }

    /// `None` when `created_at + ttl` is not representable.
    pub fn expires_at(&self) -> Option<Instant> {
        self.created_at.checked_add(self.ttl)
    }

    /// Age of the entry at `now`.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

/// Lookup statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheKey, Slot>,
    /// Insertion sequence → key, oldest first.
    order: BTreeMap<u64, CacheKey>,
    next_seq: u64,
}

impl Inner {
    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.seq);
        Some(slot.entry)
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, slot)| !slot.entry.is_valid_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }
}

/// Thread-safe response cache with lazy TTL expiry.
///
/// Cloning shares the underlying store. The lock is only held for the
/// check/insert itself, never across network I/O. When `max_entries` is
/// exceeded, expired entries are purged first, then the least recently
/// inserted ones.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    max_entries: usize,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl ResponseCache {
    /// Create a cache on the system clock.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self::with_clock(ttl, max_entries, Arc::new(SystemClock))
    }

    /// Create a cache on a custom clock.
    pub fn with_clock(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            clock,
            ttl,
            max_entries: max_entries.max(1),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Default time-to-live for entries built by [`ResponseCache::entry`].
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Build an entry stamped with this cache's clock and TTL.
    pub fn entry(
        &self,
        key: CacheKey,
        status: u16,
        headers: BTreeMap<String, String>,
        payload: Bytes,
    ) -> CacheEntry {
        CacheEntry {
            key,
            status,
            headers,
            payload,
            created_at: self.clock.now(),
            ttl: self.ttl,
        }
    }

    /// Look up a live entry. An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = self.clock.now();
        let (found, size) = {
            let mut inner = self.lock();
            let live = inner.entries.get(key).map(|slot| slot.entry.is_valid_at(now));
            let found = match live {
                Some(true) => inner.entries.get(key).map(|slot| slot.entry.clone()),
                Some(false) => {
                    inner.remove(key);
                    None
                }
                None => None,
            };
            (found, inner.entries.len())
        };

        metrics::record_cache_lookup(found.is_some());
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(cache_key = %key.short(), "cache_hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_size(size);
        }
        found
    }

    /// Store an entry under `key`, replacing any previous one.
    ///
    /// Returns the number of entries evicted to stay within `max_entries`.
    pub fn put(&self, key: CacheKey, entry: CacheEntry) -> usize {
        let now = self.clock.now();
        let (evicted, size) = {
            let mut inner = self.lock();
            inner.remove(&key);

            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.order.insert(seq, key.clone());
            inner.entries.insert(key.clone(), Slot { entry, seq });

            let mut evicted = 0;
            if inner.entries.len() > self.max_entries {
                evicted += inner.purge_expired(now);
            }
            while inner.entries.len() > self.max_entries {
                let Some((_, oldest)) = inner.order.pop_first() else {
                    break;
                };
                inner.entries.remove(&oldest);
                evicted += 1;
            }
            (evicted, inner.entries.len())
        };

        metrics::record_cache_size(size);
        tracing::debug!(cache_key = %key.short(), evicted, "cache_set");
        evicted
    }

    /// Number of stored entries, expired ones included until looked up.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut inner = self.lock();
            let removed = inner.entries.len();
            inner.entries.clear();
            inner.order.clear();
            removed
        };
        metrics::record_cache_size(0);
        tracing::info!(items = removed, "cache_cleared");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave a half-written slot.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;

    fn key(path: &str) -> CacheKey {
        CacheKey::new("GET", path, None::<(&str, &str)>)
    }

    fn cache_with_clock(ttl_secs: u64, max: usize) -> (ResponseCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = ResponseCache::with_clock(Duration::from_secs(ttl_secs), max, clock.clone());
        (cache, clock)
    }

    fn store(cache: &ResponseCache, path: &str, body: &'static str) {
        let k = key(path);
        let entry = cache.entry(k.clone(), 200, BTreeMap::new(), Bytes::from_static(body.as_bytes()));
        cache.put(k, entry);
    }

    #[test]
    fn test_get_put() {
        let (cache, _) = cache_with_clock(60, 16);
        assert!(cache.get(&key("/a")).is_none());

        store(&cache, "/a", "alpha");
        let entry = cache.get(&key("/a")).unwrap();
        assert_eq!(entry.payload, Bytes::from_static(b"alpha"));
        assert_eq!(entry.status, 200);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_ttl_expiry_on_simulated_clock() {
        let (cache, clock) = cache_with_clock(1, 16);
        store(&cache, "/a", "alpha");

        clock.advance(Duration::from_millis(900));
        assert!(cache.get(&key("/a")).is_some());

        clock.advance(Duration::from_millis(200));
        assert!(cache.get(&key("/a")).is_none());
        // Lazily evicted on lookup
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_valid_until_exact_deadline() {
        let (cache, clock) = cache_with_clock(1, 16);
        store(&cache, "/a", "alpha");
        clock.advance(Duration::from_secs(1));
        assert!(cache.get(&key("/a")).is_none());
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let (cache, clock) = cache_with_clock(i64::MAX as u64, 16);
        store(&cache, "/a", "alpha");

        let entry = cache.get(&key("/a")).unwrap();
        assert_eq!(entry.expires_at(), None);

        clock.advance(Duration::from_secs(365 * 24 * 3600));
        assert!(cache.get(&key("/a")).is_some());
    }

    #[test]
    fn test_replacing_entry_refreshes_it() {
        let (cache, clock) = cache_with_clock(1, 16);
        store(&cache, "/a", "old");
        clock.advance(Duration::from_millis(800));
        store(&cache, "/a", "new");
        clock.advance(Duration::from_millis(800));

        let entry = cache.get(&key("/a")).unwrap();
        assert_eq!(entry.payload, Bytes::from_static(b"new"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_least_recently_inserted_eviction() {
        let (cache, _) = cache_with_clock(60, 2);
        store(&cache, "/a", "a");
        store(&cache, "/b", "b");
        // Reading does not refresh insertion order
        assert!(cache.get(&key("/a")).is_some());
        store(&cache, "/c", "c");

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("/a")).is_none());
        assert!(cache.get(&key("/b")).is_some());
        assert!(cache.get(&key("/c")).is_some());
    }

    #[test]
    fn test_expired_entries_evicted_before_live_ones() {
        let clock = Arc::new(ManualClock::new());
        let cache = ResponseCache::with_clock(Duration::from_secs(10), 2, clock.clone());

        let short = key("/short");
        let mut entry = cache.entry(short.clone(), 200, BTreeMap::new(), Bytes::new());
        entry.ttl = Duration::from_secs(1);
        cache.put(short.clone(), entry);
        store(&cache, "/b", "b");

        clock.advance(Duration::from_secs(2));
        // /short is the oldest and expired; /b must survive
        let evicted = {
            let k = key("/c");
            let entry = cache.entry(k.clone(), 200, BTreeMap::new(), Bytes::new());
            cache.put(k, entry)
        };
        assert_eq!(evicted, 1);
        assert!(cache.get(&key("/b")).is_some());
        assert!(cache.get(&short).is_none());
    }

    #[test]
    fn test_clear() {
        let (cache, _) = cache_with_clock(60, 16);
        store(&cache, "/a", "a");
        store(&cache, "/b", "b");
        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clones_share_storage() {
        let (cache, _) = cache_with_clock(60, 16);
        let other = cache.clone();
        store(&cache, "/a", "a");
        assert!(other.get(&key("/a")).is_some());
    }

    #[test]
    fn test_concurrent_disjoint_keys() {
        let cache = ResponseCache::new(Duration::from_secs(60), 10_000);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let k = key(&format!("/t{t}/{i}"));
                        let body = Bytes::from(format!("{t}:{i}"));
                        let entry = cache.entry(k.clone(), 200, BTreeMap::new(), body.clone());
                        cache.put(k.clone(), entry);
                        assert_eq!(cache.get(&k).map(|e| e.payload), Some(body));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 8 * 200);
    }
}
