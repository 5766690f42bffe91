//! Unit Price Handler
//!
//! The share unit price is an append-only history in the database, fronted by
//! a TTL cache. The cache is advisory: read failures fall through to the
//! history, and a failed write removes the key so no stale price survives.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{PriceCache, UNIT_PRICE_KEY};
use crate::domain::policy::DEFAULT_SHARE_UNIT_PRICE;
use crate::domain::{ActorContext, DomainError, UnitPrice};
use crate::error::AppResult;
use crate::store::PriceHistory;

/// Default lifetime of a cached price.
pub const DEFAULT_PRICE_TTL: Duration = Duration::from_secs(600);

#[derive(Clone)]
pub struct UnitPriceHandler {
    history: Arc<dyn PriceHistory>,
    cache: Arc<dyn PriceCache>,
    ttl: Duration,
    default_price: i64,
}

impl UnitPriceHandler {
    pub fn new(history: Arc<dyn PriceHistory>, cache: Arc<dyn PriceCache>) -> Self {
        Self {
            history,
            cache,
            ttl: DEFAULT_PRICE_TTL,
            default_price: DEFAULT_SHARE_UNIT_PRICE,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Price served while the history is empty. 0 leaves purchases unavailable.
    pub fn with_default_price(mut self, price: i64) -> Self {
        self.default_price = price;
        self
    }

    /// Current unit price: cache, then latest history row, then the default.
    pub async fn get_unit_price(&self) -> AppResult<i64> {
        match self.cache.get(UNIT_PRICE_KEY).await {
            Ok(Some(price)) => {
                tracing::debug!(price, "Unit price served from cache");
                return Ok(price);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Unit price cache read failed"),
        }

        match self.history.latest_price().await? {
            Some(latest) => {
                if let Err(e) = self.cache.set(UNIT_PRICE_KEY, latest.price, self.ttl).await {
                    tracing::warn!(error = %e, "Unit price cache refresh failed");
                }
                Ok(latest.price)
            }
            None => {
                tracing::debug!(price = self.default_price, "No unit price recorded, using default");
                Ok(self.default_price)
            }
        }
    }

    /// Record a new unit price and publish it to the cache.
    pub async fn set_unit_price(&self, actor: &ActorContext, price: i64) -> AppResult<UnitPrice> {
        if price <= 0 {
            return Err(DomainError::InvalidAmount(format!(
                "unit price must be positive (got {price})"
            ))
            .into());
        }

        let recorded = self.history.append_price(price, actor.user_id).await?;

        if let Err(set_err) = self.cache.set(UNIT_PRICE_KEY, price, self.ttl).await {
            tracing::warn!(error = %set_err, "Unit price cache write failed, invalidating");
            if let Err(delete_err) = self.cache.delete(UNIT_PRICE_KEY).await {
                tracing::error!(
                    error = %delete_err,
                    "Unit price cache invalidation failed; stale price may be served until expiry"
                );
            }
        }

        tracing::info!(price, set_by = %actor.user_id, "Unit price updated");
        Ok(recorded)
    }
}
