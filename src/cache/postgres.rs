//! Shared price cache backed by a Postgres TTL table.
//!
//! Every instance reads and invalidates the same `price_cache` rows, so a
//! write on one node is visible to all of them without process-local state.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use super::{CacheError, PriceCache};

#[derive(Debug, Clone)]
pub struct PgPriceCache {
    pool: PgPool,
}

impl PgPriceCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceCache for PgPriceCache {
    async fn get(&self, key: &str) -> Result<Option<i64>, CacheError> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT value FROM price_cache WHERE key = $1 AND expires_at > NOW()",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            INSERT INTO price_cache (key, value, expires_at)
            VALUES ($1, $2, NOW() + make_interval(secs => $3))
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM price_cache WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
