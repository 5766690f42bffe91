//! Database module
//!
//! Connectivity and schema checks. The schema itself lives in
//! `migrations/` and is applied by the deployment, not by this binary.

use sqlx::PgPool;

/// Tables the ledger reads or writes.
pub const REQUIRED_TABLES: &[&str] = &[
    "members",
    "ledger_entries",
    "entry_statuses",
    "share_lots",
    "share_unit_prices",
    "fines",
    "price_cache",
];

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(*table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    tracing::info!(tables = REQUIRED_TABLES.len(), "Ledger schema verified");
    Ok(true)
}
