//! Unit price cache port
//!
//! A key-value cache with per-entry TTL. Callers treat every failure here as
//! a miss; the price history in the database stays authoritative.

use std::time::Duration;

use async_trait::async_trait;

pub mod local;
pub mod postgres;

pub use local::LocalPriceCache;
pub use postgres::PgPriceCache;

/// Cache key holding the current share unit price.
pub const UNIT_PRICE_KEY: &str = "share_unit_price";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait PriceCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<i64>, CacheError>;

    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
