//! In-process TTL cache for expensive aggregates
//!
//! Cache-aside layer over analytics and key-list queries. Values are stored
//! as JSON strings so the trait stays object-safe; typed access goes through
//! [`CacheExt`]. Lookups fail open: a cache problem never fails a request.

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Common cache TTLs, in seconds
pub mod ttl {
    use std::time::Duration;

    pub const SHORT: Duration = Duration::from_secs(60);
    pub const MEDIUM: Duration = Duration::from_secs(300);
    pub const LONG: Duration = Duration::from_secs(3600);
}

/// Cache key builders, one per cached query family
pub mod keys {
    use uuid::Uuid;

    pub fn api_keys(user_id: Uuid) -> String {
        format!("api_keys:{}", user_id)
    }

    pub fn usage(api_key_id: Uuid, days: i32) -> String {
        format!("usage:{}:{}", api_key_id, days)
    }

    pub fn analytics(period: &str) -> String {
        format!("analytics:{}", period)
    }
}

/// Object-safe cache interface over raw JSON values
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get_raw(&self, key: &str) -> Option<String>;
    async fn set_raw(&self, key: &str, value: String, ttl: Duration);
    async fn delete(&self, key: &str);
}

/// Typed helpers over any [`Cache`]
#[async_trait]
pub trait CacheExt: Cache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        serde_json::from_str(&raw).ok()
    }

    async fn set<T: Serialize + Sync>(&self, key: &str, value: &T, ttl: Duration) {
        if let Ok(raw) = serde_json::to_string(value) {
            self.set_raw(key, raw, ttl).await;
        }
    }

    /// Cache-aside: return the cached value or compute, store and return it.
    /// Fetch errors pass through untouched and nothing is cached.
    async fn get_or_set<T, E, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        E: Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        if let Some(hit) = self.get::<T>(key).await {
            debug!(key, "Cache hit");
            return Ok(hit);
        }

        let fresh = fetch().await?;
        self.set(key, &fresh, ttl).await;
        Ok(fresh)
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

#[derive(Clone)]
struct Entry {
    data: String,
    expires_at_ms: u64,
}

/// Moka-backed in-memory cache with per-entry TTL
pub struct MemoryCache {
    inner: MokaCache<String, Entry>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl MemoryCache {
    /// `max_ttl` bounds every entry regardless of the TTL passed to set
    pub fn new(max_capacity: u64, max_ttl: Duration) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(max_capacity)
            .time_to_live(max_ttl)
            .build();
        MemoryCache { inner }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get_raw(&self, key: &str) -> Option<String> {
        let entry = self.inner.get(key).await?;
        if entry.expires_at_ms <= now_ms() {
            self.inner.invalidate(key).await;
            return None;
        }
        Some(entry.data)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) {
        let entry = Entry {
            data: value,
            expires_at_ms: now_ms() + ttl.as_millis() as u64,
        };
        self.inner.insert(key.to_string(), entry).await;
    }

    async fn delete(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use uuid::Uuid;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        count: i64,
        label: String,
    }

    fn test_cache() -> MemoryCache {
        MemoryCache::new(100, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let cache = test_cache();
        let value = Payload { count: 3, label: "tokens".to_string() };

        cache.set("k", &value, ttl::MEDIUM).await;
        assert_eq!(cache.get::<Payload>("k").await, Some(value));
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let cache = test_cache();
        assert_eq!(cache.get::<Payload>("absent").await, None);
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = test_cache();
        cache.set("k", &1i64, Duration::from_millis(10)).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get::<i64>("k").await, None);
    }

    #[tokio::test]
    async fn delete_invalidates() {
        let cache = test_cache();
        cache.set("k", &1i64, ttl::LONG).await;
        cache.delete("k").await;
        assert_eq!(cache.get::<i64>("k").await, None);
    }

    #[tokio::test]
    async fn get_or_set_fetches_once() {
        let cache = test_cache();

        let first: Result<i64, ()> = cache.get_or_set("k", ttl::SHORT, || async { Ok(41) }).await;
        assert_eq!(first.unwrap(), 41);

        // Second call must hit the cache, not the (failing) fetcher
        let second: Result<i64, ()> = cache.get_or_set("k", ttl::SHORT, || async { Err(()) }).await;
        assert_eq!(second.unwrap(), 41);
    }

    #[test]
    fn key_builders_are_namespaced() {
        let user = Uuid::new_v4();
        assert!(keys::api_keys(user).starts_with("api_keys:"));
        assert_eq!(keys::analytics("30d"), "analytics:30d");
        assert!(keys::usage(user, 7).ends_with(":7"));
    }
}
