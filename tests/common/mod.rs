//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tokio::sync::OnceCell;
use uuid::Uuid;

use coop_ledger::cache::{LocalPriceCache, PriceCache};
use coop_ledger::handlers::{LedgerServices, UnitPriceHandler};
use coop_ledger::store::{MemoryStore, PgStore};

const SCHEMA: &str = include_str!("../../migrations/0001_ledger.sql");

static RESET: OnceCell<()> = OnceCell::const_new();

/// Connect to `DATABASE_URL`, apply the schema and clear old rows once per
/// test binary. Returns `None` when no database is configured.
pub async fn setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping Postgres test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    let conn = &pool;
    RESET
        .get_or_init(|| async move {
            conn.execute(SCHEMA).await.expect("Failed to apply schema");
            sqlx::query(
                "TRUNCATE TABLE price_cache, share_unit_prices, share_lots, fines, \
                 entry_statuses, ledger_entries, members CASCADE",
            )
            .execute(conn)
            .await
            .expect("Failed to clean up DB");
        })
        .await;

    Some(pool)
}

/// Insert a not-yet-activated member row.
pub async fn insert_member(pool: &PgPool) -> Uuid {
    sqlx::query_scalar("INSERT INTO members DEFAULT VALUES RETURNING id")
        .fetch_one(pool)
        .await
        .expect("Failed to insert member")
}

pub fn pg_services(pool: &PgPool, cache: Arc<dyn PriceCache>) -> (Arc<PgStore>, LedgerServices) {
    let store = Arc::new(PgStore::new(pool.clone()));
    let prices = UnitPriceHandler::new(store.clone(), cache);
    (store.clone(), LedgerServices::new(store, prices))
}

pub fn memory_services() -> (Arc<MemoryStore>, LedgerServices) {
    let store = Arc::new(MemoryStore::new());
    let prices = UnitPriceHandler::new(store.clone(), Arc::new(LocalPriceCache::new()));
    (store.clone(), LedgerServices::new(store, prices))
}
