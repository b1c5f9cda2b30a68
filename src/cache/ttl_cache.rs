// src/cache/ttl_cache.rs

use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache_event;
use crate::config::{CacheConfig, MAX_EXPIRY};
use crate::sweeper::PeriodicTask;

/// Entry in the cache
#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Hit/miss counters, read with [`TtlCache::stats`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

type Entries<V> = Arc<RwLock<HashMap<String, CacheEntry<V>>>>;

/// TTL cache shared by cloning; all clones see the same entries.
#[derive(Debug, Clone)]
pub struct TtlCache<V> {
    data: Entries<V>,
    counters: Arc<Counters>,
    config: CacheConfig,
    sweeper: Option<Arc<PeriodicTask>>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new cache. The background sweep only starts when
    /// `use_background_task` is set and a tokio runtime is running.
    pub fn new(config: CacheConfig) -> Self {
        let data: Entries<V> = Arc::new(RwLock::new(HashMap::with_capacity(
            config.max_entries.min(10_000),
        )));
        let counters = Arc::new(Counters::default());

        let sweeper = if config.use_background_task {
            if Handle::try_current().is_ok() {
                let data_clone = Arc::clone(&data);
                let counters_clone = Arc::clone(&counters);
                Some(Arc::new(PeriodicTask::spawn(
                    "cache-sweep",
                    config.cleanup_interval,
                    move || {
                        let removed = Self::sweep(&data_clone);
                        counters_clone
                            .evictions
                            .fetch_add(removed as u64, Ordering::Relaxed);
                        async move {
                            if removed > 0 {
                                debug!(removed, "Swept expired cache entries");
                            }
                        }
                    },
                )))
            } else {
                warn!("No tokio runtime, cache sweep disabled");
                None
            }
        } else {
            None
        };

        Self {
            data,
            counters,
            config,
            sweeper,
        }
    }

    fn sweep(data: &Entries<V>) -> usize {
        let now = Instant::now();
        let mut data = data.write();
        let before = data.len();
        data.retain(|_, entry| entry.expires_at > now);
        before - data.len()
    }

    /// Returns the value if present and fresh. Expired entries are evicted.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        {
            let data = self.data.read();
            match data.get(key) {
                None => {
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    cache_event!("get", key, false);
                    return None;
                }
                Some(entry) if entry.expires_at > now => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    cache_event!("get", key, true);
                    return Some(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        // Key is expired, drop read lock and acquire write lock to remove it
        self.evict_if_expired(key, now);
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        cache_event!("get", key, false);
        None
    }

    /// Same expiry semantics as [`get`](Self::get) without cloning the value
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        let fresh = match self.data.read().get(key) {
            None => return false,
            Some(entry) => entry.expires_at > now,
        };

        if !fresh {
            self.evict_if_expired(key, now);
        }
        fresh
    }

    fn evict_if_expired(&self, key: &str, now: Instant) {
        let mut data = self.data.write();
        // another caller may have refreshed it between the two locks
        if data.get(key).is_some_and(|e| e.expires_at <= now) {
            data.remove(key);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Store `value` for `ttl`, replacing any previous entry.
    /// TTLs beyond [`MAX_EXPIRY`] are clamped to it.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now + ttl.min(MAX_EXPIRY);
        let mut data = self.data.write();

        if !data.contains_key(key) && data.len() >= self.config.max_entries {
            let before = data.len();
            data.retain(|_, entry| entry.expires_at > now);
            let mut evicted = before - data.len();

            if data.len() >= self.config.max_entries {
                let soonest = data
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(victim) = soonest {
                    data.remove(&victim);
                    evicted += 1;
                }
            }

            self.counters
                .evictions
                .fetch_add(evicted as u64, Ordering::Relaxed);
        }

        data.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at,
            },
        );
    }

    /// Store with the configured default TTL
    pub fn set_default(&self, key: &str, value: V) {
        self.set(key, value, self.config.default_ttl);
    }

    pub fn delete(&self, key: &str) -> bool {
        self.data.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.data.write().clear();
    }

    /// Number of stored entries, expired ones included until swept
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Evict every expired entry now, returns how many were removed
    pub fn sweep_expired(&self) -> usize {
        let removed = Self::sweep(&self.data);
        self.counters
            .evictions
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    /// Return the cached value for `key`, or run `operation` and cache its
    /// success for `ttl`. Failures are returned as-is and never stored.
    ///
    /// Concurrent misses on the same key each run `operation`.
    pub async fn with_cache<F, Fut, E>(&self, key: &str, ttl: Duration, operation: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = operation().await?;
        self.set(key, value.clone(), ttl);
        cache_event!("store", key, false);
        Ok(value)
    }

    /// Stop the background sweep. Entries stay readable.
    pub fn shutdown(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.stop();
        }
    }
}
