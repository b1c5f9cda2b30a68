// src/cache/tests/mod.rs

mod ttl_cache_tests;

// Common utilities for cache tests
pub(crate) mod common {
    use std::time::Duration;

    use crate::cache::TtlCache;
    use crate::config::CacheConfig;

    /// Cache without a background sweep, so tests control eviction
    pub fn create_test_cache<V>() -> TtlCache<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        TtlCache::new(CacheConfig {
            default_ttl: Duration::from_secs(60),
            max_entries: 1_000,
            use_background_task: false,
            cleanup_interval: Duration::from_secs(300),
        })
    }
}
