#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time;

    use super::super::common::create_test_cache;
    use crate::cache::{cache_key, TtlCache};
    use crate::config::{CacheConfig, GovernanceConfig, MAX_EXPIRY};
    use crate::error::GovernanceError;

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get_until_ttl_elapses() {
        let cache = create_test_cache::<String>();

        for ttl_secs in [1u64, 30, 3600] {
            let key = format!("ttl:{}", ttl_secs);
            cache.set(&key, "value".to_string(), Duration::from_secs(ttl_secs));
            assert_eq!(cache.get(&key).as_deref(), Some("value"));
            assert!(cache.has(&key));
        }

        time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("ttl:1"), None, "1s entry should have expired");
        assert!(!cache.has("ttl:1"));
        assert!(cache.has("ttl:30"));

        time::advance(Duration::from_secs(3600)).await;
        assert!(!cache.has("ttl:30"));
        assert_eq!(cache.get("ttl:3600"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_read_evicts_entry() {
        let cache = create_test_cache::<u32>();
        cache.set("short", 1, Duration::from_millis(500));
        assert_eq!(cache.len(), 1);

        time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.len(), 0, "expired entry should be removed on read");
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let cache = create_test_cache::<Vec<u32>>();
        cache.set("k", vec![1, 2], Duration::from_secs(60));
        cache.set("k", vec![3], Duration::from_secs(60));

        assert_eq!(cache.get("k"), Some(vec![3]), "second set must not merge");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_expiry() {
        let cache = create_test_cache::<u32>();
        cache.set("k", 1, Duration::from_secs(10));
        time::advance(Duration::from_secs(8)).await;
        cache.set("k", 2, Duration::from_secs(10));
        time::advance(Duration::from_secs(8)).await;

        assert_eq!(cache.get("k"), Some(2));
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let cache = create_test_cache::<u32>();
        cache.set("a", 1, Duration::from_secs(60));
        cache.set("b", 2, Duration::from_secs(60));

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"), "second delete finds nothing");
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_with_cache_runs_operation_once() {
        let cache = create_test_cache::<String>();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cache
                .with_cache("report:example.com", Duration::from_secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, GovernanceError>("scored".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "scored");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_with_cache_does_not_store_failures() {
        let cache = create_test_cache::<String>();
        let calls = AtomicUsize::new(0);

        let first = cache
            .with_cache("report:broken", Duration::from_secs(60), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(GovernanceError::Timeout("provider slow".to_string()))
            })
            .await;
        assert_eq!(
            first,
            Err(GovernanceError::Timeout("provider slow".to_string()))
        );
        assert!(!cache.has("report:broken"));

        let second = cache
            .with_cache("report:broken", Duration::from_secs(60), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, GovernanceError>("recovered".to_string())
            })
            .await;
        assert_eq!(second.as_deref(), Ok("recovered"));
        assert_eq!(calls.load(Ordering::SeqCst), 2, "failure must not poison the key");
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_scenario_shares_value_then_recomputes() {
        let cache = create_test_cache::<Arc<Vec<String>>>();
        let computations = AtomicUsize::new(0);
        let key = cache_key(["history", "24", "0"]);
        assert_eq!(key, "history:24:0");

        let load = || async {
            computations.fetch_add(1, Ordering::SeqCst);
            Ok::<_, GovernanceError>(Arc::new(vec!["example.com".to_string()]))
        };

        let first = cache
            .with_cache(&key, Duration::from_secs(60), load)
            .await
            .unwrap();
        time::advance(Duration::from_secs(10)).await;
        let second = cache
            .with_cache(&key, Duration::from_secs(60), load)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second), "same object within the TTL");
        assert_eq!(computations.load(Ordering::SeqCst), 1);

        time::advance(Duration::from_secs(51)).await;
        let third = cache
            .with_cache(&key, Duration::from_secs(60), load)
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(computations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let cache = create_test_cache::<u32>();
        cache.set("old", 1, Duration::from_secs(1));
        cache.set("new", 2, Duration::from_secs(100));

        time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_evicts_abandoned_keys() {
        let cache = TtlCache::new(CacheConfig {
            default_ttl: Duration::from_secs(60),
            max_entries: 100,
            use_background_task: true,
            cleanup_interval: Duration::from_secs(300),
        });
        cache.set("abandoned", 7u32, Duration::from_secs(10));

        time::sleep(Duration::from_secs(301)).await;
        assert_eq!(cache.len(), 0, "sweep should run without any reads");

        cache.shutdown();
        cache.set("after", 1u32, Duration::from_secs(1));
        time::sleep(Duration::from_secs(700)).await;
        assert_eq!(cache.len(), 1, "stopped sweep no longer evicts");
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cache_evicts_soonest_expiry() {
        let cache = TtlCache::new(CacheConfig {
            default_ttl: Duration::from_secs(60),
            max_entries: 2,
            use_background_task: false,
            cleanup_interval: Duration::from_secs(300),
        });
        cache.set("soon", 1u32, Duration::from_secs(5));
        cache.set("later", 2u32, Duration::from_secs(500));
        cache.set("newest", 3u32, Duration::from_secs(50));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("soon"), None);
        assert_eq!(cache.get("later"), Some(2));
        assert_eq!(cache.get("newest"), Some(3));
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = create_test_cache::<u32>();
        let other = cache.clone();
        cache.set_default("shared", 9);
        assert_eq!(other.get("shared"), Some(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_ttl_is_clamped() {
        let config = GovernanceConfig::from_lookup(|name| match name {
            "LLM_API_KEY" => Some("sk-test".to_string()),
            "CACHE_TTL_SECONDS" => Some(u64::MAX.to_string()),
            _ => None,
        })
        .unwrap();
        let cache = TtlCache::new(CacheConfig {
            use_background_task: false,
            ..config.cache
        });

        cache.set_default("forever", 1u32);
        cache.set("max", 2u32, Duration::MAX);
        let computed = cache
            .with_cache("computed", Duration::MAX, || async {
                Ok::<_, GovernanceError>(3u32)
            })
            .await
            .unwrap();
        assert_eq!(computed, 3);

        time::advance(MAX_EXPIRY - Duration::from_secs(1)).await;
        assert_eq!(cache.get("forever"), Some(1));
        assert_eq!(cache.get("max"), Some(2));

        time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("computed"), None, "clamped entries still expire");
    }
}
