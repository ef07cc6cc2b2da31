//! Integration tests for the Redis token cache
//!
//! These tests require a running Redis instance.
//! Run with: REDIS_URL=redis://localhost:6379 cargo test --test cache_integration_test -- --ignored

#[cfg(feature = "cache")]
mod cache_tests {
    use airtel_gateway::cache::{cache::Cache, keys, CacheConfig, RedisCache, RedisTokenStore};
    use airtel_gateway::payments::token::TokenStore;
    use std::time::Duration;

    async fn setup_cache() -> RedisCache {
        let config = CacheConfig {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            ..Default::default()
        };

        let pool = airtel_gateway::cache::init_cache_pool(config)
            .await
            .expect("Failed to init cache pool");
        RedisCache::new(pool)
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_token_store_round_trip() {
        let store = RedisTokenStore::new(setup_cache().await, "sandbox", "it-round-trip");

        store.evict().await;
        assert_eq!(store.get().await, None);

        store.put("token-abc", Duration::from_secs(60)).await;
        assert_eq!(store.get().await.as_deref(), Some("token-abc"));

        store.evict().await;
        assert_eq!(store.get().await, None);
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_token_expires() {
        let store = RedisTokenStore::new(setup_cache().await, "sandbox", "it-expiry");

        store.put("short-lived", Duration::from_secs(1)).await;
        assert!(store.get().await.is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.get().await, None);
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_environments_do_not_share_tokens() {
        let cache = setup_cache().await;
        let sandbox = RedisTokenStore::new(cache.clone(), "sandbox", "it-shared");
        let live = RedisTokenStore::new(cache.clone(), "live", "it-shared");

        live.evict().await;
        sandbox.put("sandbox-token", Duration::from_secs(60)).await;

        assert_eq!(live.get().await, None);
        let raw = <RedisCache as Cache<String>>::get(&cache, &keys::access_token("sandbox", "it-shared"))
            .await
            .unwrap();
        assert_eq!(raw.as_deref(), Some("sandbox-token"));

        sandbox.evict().await;
    }
}
