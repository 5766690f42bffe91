//! Postgres store
//!
//! sqlx implementation of the persistence ports. Joined reads come back as
//! flat rows and are folded into records here; enum columns are stored as
//! their upper snake case names.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{
    DirectionTotals, EntryFilter, EntryRecord, FineFilter, FineRecord, FineStore, LedgerStore,
    LedgerTx, MemberStore, PriceHistory, ShareStore, StatusRecord, StoreResult,
};
use crate::domain::{
    Decision, EntryState, EntryStatus, Fine, LedgerEntry, LedgerType, Member, NewEntry, NewFine, NewShareLot,
    ShareLot, ShareTotals, UnitPrice,
};
use crate::pagination::{PageQuery, SortColumn};

// =========================================================================
// Row projections
// =========================================================================

const ENTRY_COLUMNS: &str =
    "id, member_id, amount, description, reference, direction, ledger_type, created_at";

const STATUS_COLUMNS: &str = "id, entry_id, confirmed_at, rejected_at, created_at";

const FINE_COLUMNS: &str =
    "id, admin_id, member_id, entry_id, amount, reason, deadline, paid_at, created_at, updated_at";

const ENTRY_SELECT: &str = r#"
    SELECT e.id, e.member_id, e.amount, e.description, e.reference,
           e.direction, e.ledger_type, e.created_at,
           s.id AS status_id, s.confirmed_at, s.rejected_at,
           s.created_at AS status_created_at
    FROM ledger_entries e
    JOIN entry_statuses s ON s.entry_id = e.id
    WHERE TRUE"#;

const FINE_SELECT: &str = r#"
    SELECT f.id, f.admin_id, f.member_id, f.entry_id, f.amount, f.reason,
           f.deadline, f.paid_at, f.created_at, f.updated_at,
           e.member_id AS p_member_id, e.amount AS p_amount,
           e.description AS p_description, e.reference AS p_reference,
           e.direction AS p_direction, e.ledger_type AS p_ledger_type,
           e.created_at AS p_created_at,
           s.id AS p_status_id, s.confirmed_at AS p_confirmed_at,
           s.rejected_at AS p_rejected_at, s.created_at AS p_status_created_at
    FROM fines f
    LEFT JOIN ledger_entries e ON e.id = f.entry_id
    LEFT JOIN entry_statuses s ON s.entry_id = e.id
    WHERE TRUE"#;

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: Uuid,
    member_id: Uuid,
    amount: i64,
    description: String,
    reference: String,
    direction: String,
    ledger_type: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for LedgerEntry {
    type Error = super::StoreError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(LedgerEntry {
            id: row.id,
            member_id: row.member_id,
            amount: row.amount,
            description: row.description,
            reference: row.reference,
            direction: row.direction.parse()?,
            ledger_type: row.ledger_type.parse()?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatusRow {
    id: Uuid,
    entry_id: Uuid,
    confirmed_at: Option<DateTime<Utc>>,
    rejected_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<StatusRow> for EntryStatus {
    fn from(row: StatusRow) -> Self {
        EntryStatus {
            id: row.id,
            entry_id: row.entry_id,
            confirmed_at: row.confirmed_at,
            rejected_at: row.rejected_at,
            created_at: row.created_at,
        }
    }
}

/// Entry joined with its status.
#[derive(Debug, sqlx::FromRow)]
struct EntryStatusRow {
    #[sqlx(flatten)]
    entry: EntryRow,
    status_id: Uuid,
    confirmed_at: Option<DateTime<Utc>>,
    rejected_at: Option<DateTime<Utc>>,
    status_created_at: DateTime<Utc>,
}

impl TryFrom<EntryStatusRow> for EntryRecord {
    type Error = super::StoreError;

    fn try_from(row: EntryStatusRow) -> Result<Self, Self::Error> {
        let status = EntryStatus {
            id: row.status_id,
            entry_id: row.entry.id,
            confirmed_at: row.confirmed_at,
            rejected_at: row.rejected_at,
            created_at: row.status_created_at,
        };
        Ok(EntryRecord {
            entry: row.entry.try_into()?,
            status,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FineRow {
    id: Uuid,
    admin_id: Uuid,
    member_id: Uuid,
    entry_id: Option<Uuid>,
    amount: i64,
    reason: String,
    deadline: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FineRow> for Fine {
    fn from(row: FineRow) -> Self {
        Fine {
            id: row.id,
            admin_id: row.admin_id,
            member_id: row.member_id,
            entry_id: row.entry_id,
            amount: row.amount,
            reason: row.reason,
            deadline: row.deadline,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fine with the optional payment entry and status flattened alongside.
#[derive(Debug, sqlx::FromRow)]
struct FineJoinRow {
    #[sqlx(flatten)]
    fine: FineRow,
    p_member_id: Option<Uuid>,
    p_amount: Option<i64>,
    p_description: Option<String>,
    p_reference: Option<String>,
    p_direction: Option<String>,
    p_ledger_type: Option<String>,
    p_created_at: Option<DateTime<Utc>>,
    p_status_id: Option<Uuid>,
    p_confirmed_at: Option<DateTime<Utc>>,
    p_rejected_at: Option<DateTime<Utc>>,
    p_status_created_at: Option<DateTime<Utc>>,
}

impl TryFrom<FineJoinRow> for FineRecord {
    type Error = super::StoreError;

    fn try_from(row: FineJoinRow) -> Result<Self, Self::Error> {
        let payment = match (
            row.fine.entry_id,
            row.p_member_id,
            row.p_amount,
            row.p_description,
            row.p_reference,
            row.p_direction,
            row.p_ledger_type,
            row.p_created_at,
            row.p_status_id,
            row.p_status_created_at,
        ) {
            (
                Some(entry_id),
                Some(member_id),
                Some(amount),
                Some(description),
                Some(reference),
                Some(direction),
                Some(ledger_type),
                Some(created_at),
                Some(status_id),
                Some(status_created_at),
            ) => Some(EntryRecord {
                entry: EntryRow {
                    id: entry_id,
                    member_id,
                    amount,
                    description,
                    reference,
                    direction,
                    ledger_type,
                    created_at,
                }
                .try_into()?,
                status: EntryStatus {
                    id: status_id,
                    entry_id,
                    confirmed_at: row.p_confirmed_at,
                    rejected_at: row.p_rejected_at,
                    created_at: status_created_at,
                },
            }),
            _ => None,
        };

        Ok(FineRecord {
            fine: row.fine.into(),
            payment,
        })
    }
}

fn push_entry_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &EntryFilter) {
    if let Some(member_id) = filter.member_id {
        qb.push(" AND e.member_id = ").push_bind(member_id);
    }
    if let Some(ledger_type) = filter.ledger_type {
        qb.push(" AND e.ledger_type = ").push_bind(ledger_type.as_str());
    }
    if let Some(direction) = filter.direction {
        qb.push(" AND e.direction = ").push_bind(direction.as_str());
    }
    match filter.state {
        Some(EntryState::Pending) => {
            qb.push(" AND s.confirmed_at IS NULL AND s.rejected_at IS NULL");
        }
        Some(EntryState::Confirmed) => {
            qb.push(" AND s.confirmed_at IS NOT NULL");
        }
        Some(EntryState::Rejected) => {
            qb.push(" AND s.rejected_at IS NOT NULL");
        }
        None => {}
    }
}

fn fine_sort_column(column: SortColumn) -> &'static str {
    match column {
        SortColumn::CreatedAt => "f.created_at",
        SortColumn::Deadline => "f.deadline",
    }
}

// =========================================================================
// PgStore
// =========================================================================

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn find_status(&self, status_id: Uuid) -> StoreResult<Option<StatusRecord>> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(ENTRY_SELECT);
        qb.push(" AND s.id = ").push_bind(status_id);

        let row: Option<EntryStatusRow> = qb.build_query_as().fetch_optional(&self.pool).await?;

        row.map(|row| {
            let record = EntryRecord::try_from(row)?;
            Ok(StatusRecord {
                member_id: record.entry.member_id,
                ledger_type: record.entry.ledger_type,
                status: record.status,
            })
        })
        .transpose()
    }

    async fn confirmed_totals(
        &self,
        member_id: Uuid,
        ledger_type: LedgerType,
    ) -> StoreResult<DirectionTotals> {
        let (deposits, withdrawals): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(e.amount) FILTER (WHERE e.direction = 'DEPOSIT'), 0)::BIGINT,
                COALESCE(SUM(e.amount) FILTER (WHERE e.direction = 'WITHDRAWAL'), 0)::BIGINT
            FROM ledger_entries e
            JOIN entry_statuses s ON s.entry_id = e.id
            WHERE e.member_id = $1
              AND e.ledger_type = $2
              AND s.confirmed_at IS NOT NULL
              AND s.rejected_at IS NULL
            "#,
        )
        .bind(member_id)
        .bind(ledger_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(DirectionTotals {
            deposits,
            withdrawals,
        })
    }

    async fn list_entries(
        &self,
        filter: &EntryFilter,
        page: &PageQuery,
    ) -> StoreResult<Vec<EntryRecord>> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(ENTRY_SELECT);
        push_entry_filter(&mut qb, filter);
        page.push_keyset(&mut qb, "e.created_at", "e.id");
        page.push_order_limit(&mut qb, "e.created_at", "e.id");

        let rows: Vec<EntryStatusRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(EntryRecord::try_from).collect()
    }
}

#[async_trait]
impl FineStore for PgStore {
    async fn find_fine(&self, fine_id: Uuid) -> StoreResult<Option<FineRecord>> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(FINE_SELECT);
        qb.push(" AND f.id = ").push_bind(fine_id);

        let row: Option<FineJoinRow> = qb.build_query_as().fetch_optional(&self.pool).await?;
        row.map(FineRecord::try_from).transpose()
    }

    async fn list_fines(&self, filter: &FineFilter, page: &PageQuery) -> StoreResult<Vec<FineRecord>> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(FINE_SELECT);
        if let Some(member_id) = filter.member_id {
            qb.push(" AND f.member_id = ").push_bind(member_id);
        }
        match filter.paid {
            Some(true) => {
                qb.push(" AND f.paid_at IS NOT NULL");
            }
            Some(false) => {
                qb.push(" AND f.paid_at IS NULL");
            }
            None => {}
        }
        let column = fine_sort_column(page.column);
        page.push_keyset(&mut qb, column, "f.id");
        page.push_order_limit(&mut qb, column, "f.id");

        let rows: Vec<FineJoinRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(FineRecord::try_from).collect()
    }
}

#[async_trait]
impl ShareStore for PgStore {
    async fn share_totals(&self, member_id: Option<Uuid>) -> StoreResult<ShareTotals> {
        let (units, amount): (Decimal, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(l.units), 0)::NUMERIC(20, 4),
                COALESCE(SUM(e.amount), 0)::BIGINT
            FROM share_lots l
            JOIN ledger_entries e ON e.id = l.entry_id
            JOIN entry_statuses s ON s.entry_id = e.id
            WHERE e.ledger_type = 'SHARES'
              AND e.direction = 'DEPOSIT'
              AND s.confirmed_at IS NOT NULL
              AND s.rejected_at IS NULL
              AND ($1::UUID IS NULL OR e.member_id = $1)
            "#,
        )
        .bind(member_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ShareTotals { units, amount })
    }

    async fn find_share_lot(&self, entry_id: Uuid) -> StoreResult<Option<ShareLot>> {
        let row: Option<(Uuid, Uuid, Decimal, i64, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, entry_id, units, unit_price, created_at FROM share_lots WHERE entry_id = $1",
        )
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, entry_id, units, unit_price, created_at)| ShareLot {
            id,
            entry_id,
            units,
            unit_price,
            created_at,
        }))
    }
}

#[async_trait]
impl PriceHistory for PgStore {
    async fn latest_price(&self) -> StoreResult<Option<UnitPrice>> {
        let row: Option<(Uuid, i64, Uuid, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, price, set_by, created_at
            FROM share_unit_prices
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, price, set_by, created_at)| UnitPrice {
            id,
            price,
            set_by,
            created_at,
        }))
    }

    async fn append_price(&self, price: i64, set_by: Uuid) -> StoreResult<UnitPrice> {
        let (id, price, set_by, created_at): (Uuid, i64, Uuid, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO share_unit_prices (price, set_by)
            VALUES ($1, $2)
            RETURNING id, price, set_by, created_at
            "#,
        )
        .bind(price)
        .bind(set_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(UnitPrice {
            id,
            price,
            set_by,
            created_at,
        })
    }
}

#[async_trait]
impl MemberStore for PgStore {
    async fn get(&self, member_id: Uuid) -> StoreResult<Option<Member>> {
        let row: Option<(Uuid, Option<DateTime<Utc>>, DateTime<Utc>)> =
            sqlx::query_as("SELECT id, activated_at, created_at FROM members WHERE id = $1")
                .bind(member_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, activated_at, created_at)| Member {
            id,
            activated_at,
            created_at,
        }))
    }
}

// =========================================================================
// PgTx
// =========================================================================

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgTx {
    async fn insert_entry(&mut self, entry: &NewEntry) -> StoreResult<Option<LedgerEntry>> {
        let sql = format!(
            r#"
            INSERT INTO ledger_entries
                (member_id, amount, description, reference, direction, ledger_type)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (reference) DO NOTHING
            RETURNING {ENTRY_COLUMNS}
            "#
        );
        let row: Option<EntryRow> = sqlx::query_as(&sql)
            .bind(entry.member_id)
            .bind(entry.amount.value())
            .bind(&entry.description)
            .bind(&entry.reference)
            .bind(entry.direction.as_str())
            .bind(entry.ledger_type.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(LedgerEntry::try_from).transpose()
    }

    async fn insert_status(&mut self, entry_id: Uuid) -> StoreResult<EntryStatus> {
        let sql = format!("INSERT INTO entry_statuses (entry_id) VALUES ($1) RETURNING {STATUS_COLUMNS}");
        let row: StatusRow = sqlx::query_as(&sql)
            .bind(entry_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.into())
    }

    async fn decide_status(
        &mut self,
        status_id: Uuid,
        decision: Decision,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<EntryStatus>> {
        let column = match decision {
            Decision::Confirm => "confirmed_at",
            Decision::Reject => "rejected_at",
        };
        let sql = format!(
            r#"
            UPDATE entry_statuses
            SET {column} = $2
            WHERE id = $1
              AND confirmed_at IS NULL
              AND rejected_at IS NULL
            RETURNING {STATUS_COLUMNS}
            "#
        );
        let row: Option<StatusRow> = sqlx::query_as(&sql)
            .bind(status_id)
            .bind(at)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn activate_member(&mut self, member_id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let rows_affected = sqlx::query(
            "UPDATE members SET activated_at = $2 WHERE id = $1 AND activated_at IS NULL",
        )
        .bind(member_id)
        .bind(at)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn settle_fine(&mut self, entry_id: Uuid, at: DateTime<Utc>) -> StoreResult<Option<Fine>> {
        let sql = format!(
            r#"
            UPDATE fines
            SET paid_at = $2, updated_at = $2
            WHERE entry_id = $1 AND paid_at IS NULL
            RETURNING {FINE_COLUMNS}
            "#
        );
        let row: Option<FineRow> = sqlx::query_as(&sql)
            .bind(entry_id)
            .bind(at)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn insert_share_lot(&mut self, lot: &NewShareLot) -> StoreResult<ShareLot> {
        let (id, entry_id, units, unit_price, created_at): (Uuid, Uuid, Decimal, i64, DateTime<Utc>) =
            sqlx::query_as(
                r#"
                INSERT INTO share_lots (entry_id, units, unit_price)
                VALUES ($1, $2, $3)
                RETURNING id, entry_id, units, unit_price, created_at
                "#,
            )
            .bind(lot.entry_id)
            .bind(lot.units.to_decimal())
            .bind(lot.unit_price)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(ShareLot {
            id,
            entry_id,
            units,
            unit_price,
            created_at,
        })
    }

    async fn insert_fine(&mut self, fine: &NewFine) -> StoreResult<Fine> {
        let sql = format!(
            r#"
            INSERT INTO fines (admin_id, member_id, amount, reason, deadline)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {FINE_COLUMNS}
            "#
        );
        let row: FineRow = sqlx::query_as(&sql)
            .bind(fine.admin_id)
            .bind(fine.member_id)
            .bind(fine.amount.value())
            .bind(&fine.reason)
            .bind(fine.deadline)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.into())
    }

    async fn lock_fine(&mut self, fine_id: Uuid) -> StoreResult<Option<FineRecord>> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(FINE_SELECT);
        qb.push(" AND f.id = ").push_bind(fine_id).push(" FOR UPDATE OF f");

        let row: Option<FineJoinRow> = qb.build_query_as().fetch_optional(&mut *self.tx).await?;
        row.map(FineRecord::try_from).transpose()
    }

    async fn link_fine_entry(&mut self, fine_id: Uuid, entry_id: Uuid) -> StoreResult<Fine> {
        let sql = format!(
            r#"
            UPDATE fines
            SET entry_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {FINE_COLUMNS}
            "#
        );
        let row: FineRow = sqlx::query_as(&sql)
            .bind(fine_id)
            .bind(entry_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.into())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
