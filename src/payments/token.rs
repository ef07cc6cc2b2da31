//! OAuth2 bearer token storage
//!
//! Airtel issues client-credentials tokens with a short lifetime. The provider
//! asks the store first and only hits `auth/oauth2/token` on a miss.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Seconds shaved off `expires_in` so a token is never used right at expiry
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(10);

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self) -> Option<String>;

    async fn put(&self, token: &str, ttl: Duration);

    async fn evict(&self);
}

/// Usable lifetime of a token given Airtel's `expires_in`
pub fn effective_ttl(expires_in: Duration) -> Duration {
    expires_in.saturating_sub(EXPIRY_MARGIN)
}

/// Process-local token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: RwLock<Option<(String, Instant)>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self) -> Option<String> {
        let slot = self.slot.read().await;
        match slot.as_ref() {
            Some((token, expires_at)) if Instant::now() < *expires_at => Some(token.clone()),
            _ => None,
        }
    }

    async fn put(&self, token: &str, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        *self.slot.write().await = Some((token.to_string(), Instant::now() + ttl));
    }

    async fn evict(&self) {
        *self.slot.write().await = None;
    }
}
