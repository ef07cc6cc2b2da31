//! Redis-backed bearer token store
//!
//! Lets several gateway instances share one Airtel access token.

use super::{keys, Cache, RedisCache};
use crate::payments::token::TokenStore;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

pub struct RedisTokenStore {
    cache: RedisCache,
    key: String,
}

impl RedisTokenStore {
    pub fn new(cache: RedisCache, environment: &str, client_id: &str) -> Self {
        Self {
            cache,
            key: keys::access_token(environment, client_id),
        }
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn get(&self) -> Option<String> {
        match Cache::<String>::get(&self.cache, &self.key).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Token cache read failed: {}", e);
                None
            }
        }
    }

    async fn put(&self, token: &str, ttl: Duration) {
        // SETEX rejects a zero expiry
        if ttl.as_secs() == 0 {
            return;
        }
        if let Err(e) = Cache::<String>::set(&self.cache, &self.key, &token.to_string(), Some(ttl)).await {
            warn!("Token cache write failed: {}", e);
        }
    }

    async fn evict(&self) {
        if let Err(e) = Cache::<String>::delete(&self.cache, &self.key).await {
            warn!("Token cache eviction failed: {}", e);
        }
    }
}
