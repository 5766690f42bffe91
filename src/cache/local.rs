//! Process-local price cache using Moka.
//!
//! Only correct for a single instance: other processes never see its
//! invalidations. Multi-instance deployments use [`super::PgPriceCache`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;

use super::{CacheError, PriceCache};

/// Default cache capacity (number of keys).
const DEFAULT_CACHE_CAPACITY: u64 = 64;

/// Upper bound on any entry's lifetime (1 hour).
const MAX_TTL_SECS: u64 = 3600;

/// Cached value with the TTL it was written with.
#[derive(Debug, Clone, Copy)]
struct Priced {
    value: i64,
    ttl: Duration,
}

/// Per-entry expiry, capped at `MAX_TTL_SECS`.
struct PricedExpiry;

impl Expiry<String, Priced> for PricedExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Priced,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Priced,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

#[derive(Clone)]
pub struct LocalPriceCache {
    cache: Cache<String, Priced>,
}

impl LocalPriceCache {
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(DEFAULT_CACHE_CAPACITY)
            .expire_after(PricedExpiry)
            .build();

        Self { cache }
    }
}

impl Default for LocalPriceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceCache for LocalPriceCache {
    async fn get(&self, key: &str) -> Result<Option<i64>, CacheError> {
        Ok(self.cache.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError> {
        let ttl = ttl.min(Duration::from_secs(MAX_TTL_SECS));
        self.cache.insert(key.to_string(), Priced { value, ttl }).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.cache.invalidate(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = LocalPriceCache::new();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set("k", 50_000, Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(50_000));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = LocalPriceCache::new();
        cache.set("k", 1, Duration::from_millis(0)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_ttl_is_capped() {
        let cache = LocalPriceCache::new();
        cache.set("k", 7, Duration::MAX).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(7));

        cache.set("k", 8, Duration::from_secs(u64::MAX)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(8));
    }
}
