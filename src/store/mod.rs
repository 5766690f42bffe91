//! Persistence ports
//!
//! Handlers depend on these narrow traits rather than on a concrete database.
//! Reads go through the store traits directly; every multi-row write happens
//! on a [`LedgerTx`] obtained from [`LedgerStore::begin`] and is finished with
//! [`finish`], which commits on success and rolls back on any error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Decision, Direction, DomainError, EntryState, EntryStatus, EntryView, Fine, FineView,
    LedgerEntry, LedgerType, Member, NewEntry, NewFine, NewShareLot, ShareLot, ShareTotals,
    UnitPrice,
};
use crate::error::AppResult;
use crate::pagination::{Cursor, Keyed, PageQuery, SortColumn};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage-level failures. sqlx errors pass through unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored column holds a value the domain cannot represent
    #[error("Invalid stored value: {0}")]
    Decode(String),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        StoreError::Decode(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// =========================================================================
// Records
// =========================================================================

/// A status row with the entry fields a decision dispatches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub status: EntryStatus,
    pub member_id: Uuid,
    pub ledger_type: LedgerType,
}

/// Entry joined with its status, before the state is validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    pub entry: LedgerEntry,
    pub status: EntryStatus,
}

impl EntryRecord {
    pub fn into_view(self) -> Result<EntryView, DomainError> {
        EntryView::new(self.entry, self.status)
    }
}

impl Keyed for EntryRecord {
    fn sort_key(&self, _column: SortColumn) -> Cursor {
        Cursor::new(self.entry.created_at, self.entry.id)
    }
}

/// Fine joined with its payment entry, if one was ever linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FineRecord {
    pub fine: Fine,
    pub payment: Option<EntryRecord>,
}

impl FineRecord {
    pub fn into_view(self) -> Result<FineView, DomainError> {
        let payment = self.payment.map(EntryRecord::into_view).transpose()?;
        Ok(FineView::new(self.fine, payment))
    }
}

impl Keyed for FineRecord {
    fn sort_key(&self, column: SortColumn) -> Cursor {
        let ts = match column {
            SortColumn::CreatedAt => self.fine.created_at,
            SortColumn::Deadline => self.fine.deadline,
        };
        Cursor::new(ts, self.fine.id)
    }
}

/// Confirmed sums for one member and ledger type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionTotals {
    pub deposits: i64,
    pub withdrawals: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub member_id: Option<Uuid>,
    pub ledger_type: Option<LedgerType>,
    pub direction: Option<Direction>,
    pub state: Option<EntryState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FineFilter {
    pub member_id: Option<Uuid>,
    pub paid: Option<bool>,
}

// =========================================================================
// Ports
// =========================================================================

/// Entry reads and the transaction factory.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn LedgerTx>>;

    async fn find_status(&self, status_id: Uuid) -> StoreResult<Option<StatusRecord>>;

    /// Sums over confirmed entries only.
    async fn confirmed_totals(
        &self,
        member_id: Uuid,
        ledger_type: LedgerType,
    ) -> StoreResult<DirectionTotals>;

    /// Up to `page.fetch_limit()` rows in keyset order.
    async fn list_entries(
        &self,
        filter: &EntryFilter,
        page: &PageQuery,
    ) -> StoreResult<Vec<EntryRecord>>;
}

#[async_trait]
pub trait FineStore: Send + Sync {
    async fn find_fine(&self, fine_id: Uuid) -> StoreResult<Option<FineRecord>>;

    async fn list_fines(&self, filter: &FineFilter, page: &PageQuery) -> StoreResult<Vec<FineRecord>>;
}

#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Confirmed SHARES deposits of one member, or of everyone with `None`.
    async fn share_totals(&self, member_id: Option<Uuid>) -> StoreResult<ShareTotals>;

    async fn find_share_lot(&self, entry_id: Uuid) -> StoreResult<Option<ShareLot>>;
}

/// Append-only unit price history.
#[async_trait]
pub trait PriceHistory: Send + Sync {
    async fn latest_price(&self) -> StoreResult<Option<UnitPrice>>;

    async fn append_price(&self, price: i64, set_by: Uuid) -> StoreResult<UnitPrice>;
}

/// Member lookups. Activation is written through [`LedgerTx::activate_member`]
/// so it commits together with the confirming status.
#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn get(&self, member_id: Uuid) -> StoreResult<Option<Member>>;
}

/// One atomic unit of work.
#[async_trait]
pub trait LedgerTx: Send {
    /// Returns `None` when the reference is already taken.
    async fn insert_entry(&mut self, entry: &NewEntry) -> StoreResult<Option<LedgerEntry>>;

    async fn insert_status(&mut self, entry_id: Uuid) -> StoreResult<EntryStatus>;

    /// Conditional update on a pending status. `None` means the row was not
    /// pending any more (a concurrent decision won).
    async fn decide_status(
        &mut self,
        status_id: Uuid,
        decision: Decision,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<EntryStatus>>;

    /// Stamp activation if not yet active. Returns whether a row changed.
    async fn activate_member(&mut self, member_id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;

    /// Stamp paid_at on the unpaid fine linked to `entry_id`, if any.
    async fn settle_fine(&mut self, entry_id: Uuid, at: DateTime<Utc>) -> StoreResult<Option<Fine>>;

    async fn insert_share_lot(&mut self, lot: &NewShareLot) -> StoreResult<ShareLot>;

    async fn insert_fine(&mut self, fine: &NewFine) -> StoreResult<Fine>;

    /// Read a fine and hold it against concurrent payment until commit.
    async fn lock_fine(&mut self, fine_id: Uuid) -> StoreResult<Option<FineRecord>>;

    async fn link_fine_entry(&mut self, fine_id: Uuid, entry_id: Uuid) -> StoreResult<Fine>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Commit `tx` if `result` is Ok, otherwise roll it back and return the error.
pub async fn finish<T>(tx: Box<dyn LedgerTx>, result: AppResult<T>) -> AppResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}
