//! In-memory store
//!
//! Implements every port over a single `tokio::sync::Mutex`. A transaction
//! holds the lock for its whole lifetime and keeps a snapshot of the state;
//! rollback (or dropping an unfinished transaction) restores the snapshot.
//! Transactions are therefore fully serialized. Used by tests and local runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    DirectionTotals, EntryFilter, EntryRecord, FineFilter, FineRecord, FineStore, LedgerStore,
    LedgerTx, MemberStore, PriceHistory, ShareStore, StatusRecord, StoreError, StoreResult,
};
use crate::domain::{
    Decision, Direction, EntryState, EntryStatus, Fine, LedgerEntry, LedgerType, Member, NewEntry,
    NewFine, NewShareLot, ShareLot, ShareTotals, UnitPrice,
};
use crate::pagination::PageQuery;

#[derive(Debug, Clone, Default)]
struct State {
    members: HashMap<Uuid, Member>,
    entries: HashMap<Uuid, LedgerEntry>,
    /// keyed by status id
    statuses: HashMap<Uuid, EntryStatus>,
    /// keyed by entry id
    share_lots: HashMap<Uuid, ShareLot>,
    fines: HashMap<Uuid, Fine>,
    prices: Vec<UnitPrice>,
}

/// One-shot failure switch. Lives outside `State` so a rollback cannot re-arm it.
#[derive(Debug, Clone, Default)]
struct Failures(Arc<StdMutex<Option<&'static str>>>);

impl Failures {
    fn slot(&self) -> MutexGuard<'_, Option<&'static str>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn arm(&self, op: &'static str) {
        *self.slot() = Some(op);
    }

    fn check(&self, op: &'static str) -> StoreResult<()> {
        let mut slot = self.slot();
        if *slot == Some(op) {
            *slot = None;
            return Err(StoreError::Database(sqlx::Error::Protocol(format!(
                "injected failure in {op}"
            ))));
        }
        Ok(())
    }
}

impl State {
    fn status_for_entry(&self, entry_id: Uuid) -> Option<&EntryStatus> {
        self.statuses.values().find(|s| s.entry_id == entry_id)
    }

    fn entry_record(&self, entry_id: Uuid) -> Option<EntryRecord> {
        let entry = self.entries.get(&entry_id)?;
        let status = self.status_for_entry(entry_id)?;
        Some(EntryRecord {
            entry: entry.clone(),
            status: status.clone(),
        })
    }

    fn fine_record(&self, fine: &Fine) -> FineRecord {
        FineRecord {
            fine: fine.clone(),
            payment: fine.entry_id.and_then(|id| self.entry_record(id)),
        }
    }

    fn is_confirmed(&self, entry_id: Uuid) -> bool {
        self.status_for_entry(entry_id)
            .map(|s| s.confirmed_at.is_some() && s.rejected_at.is_none())
            .unwrap_or(false)
    }
}

/// Matches a status row against a state filter without validating it.
fn status_matches(status: &EntryStatus, state: EntryState) -> bool {
    match state {
        EntryState::Pending => status.confirmed_at.is_none() && status.rejected_at.is_none(),
        EntryState::Confirmed => status.confirmed_at.is_some(),
        EntryState::Rejected => status.rejected_at.is_some(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    failures: Failures,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member the way the profile service would.
    pub async fn add_member(&self, member_id: Uuid) -> Member {
        let member = Member {
            id: member_id,
            activated_at: None,
            created_at: Utc::now(),
        };
        let mut state = self.state.lock().await;
        state.members.insert(member_id, member.clone());
        member
    }

    /// Make the next call of `op` (a `LedgerTx` method name) fail.
    pub async fn fail_next(&self, op: &'static str) {
        self.failures.arm(op);
    }

    /// Overwrite a status row as-is, bypassing the state machine.
    pub async fn force_status(&self, status: EntryStatus) {
        self.state.lock().await.statuses.insert(status.id, status);
    }

    pub async fn entry_count(&self) -> usize {
        self.state.lock().await.entries.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            snapshot: Some(snapshot),
            failures: self.failures.clone(),
        }))
    }

    async fn find_status(&self, status_id: Uuid) -> StoreResult<Option<StatusRecord>> {
        let state = self.state.lock().await;
        let Some(status) = state.statuses.get(&status_id) else {
            return Ok(None);
        };
        let entry = state
            .entries
            .get(&status.entry_id)
            .ok_or_else(|| StoreError::Decode(format!("status {status_id} has no entry")))?;
        Ok(Some(StatusRecord {
            status: status.clone(),
            member_id: entry.member_id,
            ledger_type: entry.ledger_type,
        }))
    }

    async fn confirmed_totals(
        &self,
        member_id: Uuid,
        ledger_type: LedgerType,
    ) -> StoreResult<DirectionTotals> {
        let state = self.state.lock().await;
        let mut totals = DirectionTotals::default();
        for entry in state.entries.values() {
            if entry.member_id != member_id
                || entry.ledger_type != ledger_type
                || !state.is_confirmed(entry.id)
            {
                continue;
            }
            match entry.direction {
                Direction::Deposit => totals.deposits += entry.amount,
                Direction::Withdrawal => totals.withdrawals += entry.amount,
            }
        }
        Ok(totals)
    }

    async fn list_entries(
        &self,
        filter: &EntryFilter,
        page: &PageQuery,
    ) -> StoreResult<Vec<EntryRecord>> {
        let state = self.state.lock().await;
        let rows = state
            .entries
            .values()
            .filter(|e| filter.member_id.map_or(true, |m| e.member_id == m))
            .filter(|e| filter.ledger_type.map_or(true, |t| e.ledger_type == t))
            .filter(|e| filter.direction.map_or(true, |d| e.direction == d))
            .filter_map(|e| state.entry_record(e.id))
            .filter(|r| filter.state.map_or(true, |s| status_matches(&r.status, s)));
        Ok(page.select(rows))
    }
}

#[async_trait]
impl FineStore for MemoryStore {
    async fn find_fine(&self, fine_id: Uuid) -> StoreResult<Option<FineRecord>> {
        let state = self.state.lock().await;
        Ok(state.fines.get(&fine_id).map(|f| state.fine_record(f)))
    }

    async fn list_fines(&self, filter: &FineFilter, page: &PageQuery) -> StoreResult<Vec<FineRecord>> {
        let state = self.state.lock().await;
        let rows = state
            .fines
            .values()
            .filter(|f| filter.member_id.map_or(true, |m| f.member_id == m))
            .filter(|f| filter.paid.map_or(true, |paid| f.is_paid() == paid))
            .map(|f| state.fine_record(f));
        Ok(page.select(rows))
    }
}

#[async_trait]
impl ShareStore for MemoryStore {
    async fn share_totals(&self, member_id: Option<Uuid>) -> StoreResult<ShareTotals> {
        let state = self.state.lock().await;
        let mut totals = ShareTotals::zero();
        for lot in state.share_lots.values() {
            let Some(entry) = state.entries.get(&lot.entry_id) else {
                continue;
            };
            if member_id.map_or(false, |m| entry.member_id != m)
                || entry.ledger_type != LedgerType::Shares
                || entry.direction != Direction::Deposit
                || !state.is_confirmed(entry.id)
            {
                continue;
            }
            totals.units += lot.units;
            totals.amount += entry.amount;
        }
        Ok(totals)
    }

    async fn find_share_lot(&self, entry_id: Uuid) -> StoreResult<Option<ShareLot>> {
        Ok(self.state.lock().await.share_lots.get(&entry_id).cloned())
    }
}

#[async_trait]
impl PriceHistory for MemoryStore {
    async fn latest_price(&self) -> StoreResult<Option<UnitPrice>> {
        Ok(self.state.lock().await.prices.last().cloned())
    }

    async fn append_price(&self, price: i64, set_by: Uuid) -> StoreResult<UnitPrice> {
        self.failures.check("append_price")?;
        let mut state = self.state.lock().await;
        let row = UnitPrice {
            id: Uuid::new_v4(),
            price,
            set_by,
            created_at: Utc::now(),
        };
        state.prices.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl MemberStore for MemoryStore {
    async fn get(&self, member_id: Uuid) -> StoreResult<Option<Member>> {
        Ok(self.state.lock().await.members.get(&member_id).cloned())
    }
}

// =========================================================================
// Transaction
// =========================================================================

pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    /// `None` once committed
    snapshot: Option<State>,
    failures: Failures,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn insert_entry(&mut self, entry: &NewEntry) -> StoreResult<Option<LedgerEntry>> {
        self.failures.check("insert_entry")?;
        if self.guard.entries.values().any(|e| e.reference == entry.reference) {
            return Ok(None);
        }
        let row = LedgerEntry {
            id: Uuid::new_v4(),
            member_id: entry.member_id,
            amount: entry.amount.value(),
            description: entry.description.clone(),
            reference: entry.reference.clone(),
            direction: entry.direction,
            ledger_type: entry.ledger_type,
            created_at: Utc::now(),
        };
        self.guard.entries.insert(row.id, row.clone());
        Ok(Some(row))
    }

    async fn insert_status(&mut self, entry_id: Uuid) -> StoreResult<EntryStatus> {
        self.failures.check("insert_status")?;
        let row = EntryStatus {
            id: Uuid::new_v4(),
            entry_id,
            confirmed_at: None,
            rejected_at: None,
            created_at: Utc::now(),
        };
        self.guard.statuses.insert(row.id, row.clone());
        Ok(row)
    }

    async fn decide_status(
        &mut self,
        status_id: Uuid,
        decision: Decision,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<EntryStatus>> {
        self.failures.check("decide_status")?;
        let Some(status) = self.guard.statuses.get_mut(&status_id) else {
            return Ok(None);
        };
        if status.confirmed_at.is_some() || status.rejected_at.is_some() {
            return Ok(None);
        }
        match decision {
            Decision::Confirm => status.confirmed_at = Some(at),
            Decision::Reject => status.rejected_at = Some(at),
        }
        Ok(Some(status.clone()))
    }

    async fn activate_member(&mut self, member_id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        self.failures.check("activate_member")?;
        Ok(self
            .guard
            .members
            .get_mut(&member_id)
            .map(|m| m.activate(at))
            .unwrap_or(false))
    }

    async fn settle_fine(&mut self, entry_id: Uuid, at: DateTime<Utc>) -> StoreResult<Option<Fine>> {
        self.failures.check("settle_fine")?;
        let fine = self
            .guard
            .fines
            .values_mut()
            .find(|f| f.entry_id == Some(entry_id) && f.paid_at.is_none());
        Ok(fine.map(|f| {
            f.paid_at = Some(at);
            f.updated_at = at;
            f.clone()
        }))
    }

    async fn insert_share_lot(&mut self, lot: &NewShareLot) -> StoreResult<ShareLot> {
        self.failures.check("insert_share_lot")?;
        let row = ShareLot {
            id: Uuid::new_v4(),
            entry_id: lot.entry_id,
            units: lot.units.to_decimal(),
            unit_price: lot.unit_price,
            created_at: Utc::now(),
        };
        self.guard.share_lots.insert(row.entry_id, row.clone());
        Ok(row)
    }

    async fn insert_fine(&mut self, fine: &NewFine) -> StoreResult<Fine> {
        self.failures.check("insert_fine")?;
        let now = Utc::now();
        let row = Fine {
            id: Uuid::new_v4(),
            admin_id: fine.admin_id,
            member_id: fine.member_id,
            entry_id: None,
            amount: fine.amount.value(),
            reason: fine.reason.clone(),
            deadline: fine.deadline,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        self.guard.fines.insert(row.id, row.clone());
        Ok(row)
    }

    async fn lock_fine(&mut self, fine_id: Uuid) -> StoreResult<Option<FineRecord>> {
        let state = &*self.guard;
        Ok(state.fines.get(&fine_id).map(|f| state.fine_record(f)))
    }

    async fn link_fine_entry(&mut self, fine_id: Uuid, entry_id: Uuid) -> StoreResult<Fine> {
        self.failures.check("link_fine_entry")?;
        let fine = self
            .guard
            .fines
            .get_mut(&fine_id)
            .ok_or_else(|| StoreError::Decode(format!("fine {fine_id} vanished inside transaction")))?;
        fine.entry_id = Some(entry_id);
        fine.updated_at = Utc::now();
        Ok(fine.clone())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut this = self;
        this.snapshot = None;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        // Drop restores the snapshot
        drop(self);
        Ok(())
    }
}
