//! Fine Handler
//!
//! Fines are charged by an admin and paid by the member through a FINES
//! deposit entry. Settlement (`paid_at`) happens when that entry is confirmed,
//! see [`super::decision`].

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    ActorContext, Amount, Direction, DomainError, Fine, FineView, LedgerType, NewEntry, NewFine,
};
use crate::error::{AppError, AppResult};
use crate::pagination::{Page, PageQuery, PageRequest, SortColumn};
use crate::store::{finish, FineFilter, FineRecord, FineStore, LedgerStore, LedgerTx};

use super::entries::EntryHandler;
use super::{ChargeFineCommand, FinePayment, PayFineCommand};

const FINE_SORT_COLUMNS: &[SortColumn] = &[SortColumn::CreatedAt, SortColumn::Deadline];

#[derive(Clone)]
pub struct FineHandler {
    ledger: Arc<dyn LedgerStore>,
    fines: Arc<dyn FineStore>,
    entries: EntryHandler,
}

impl FineHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>, fines: Arc<dyn FineStore>, entries: EntryHandler) -> Self {
        Self {
            ledger,
            fines,
            entries,
        }
    }

    /// Charge a fine against a member, recorded under the acting admin.
    pub async fn charge_fine(&self, actor: &ActorContext, command: ChargeFineCommand) -> AppResult<Fine> {
        let amount = Amount::new(command.amount).map_err(DomainError::from)?;
        let new_fine = NewFine {
            admin_id: actor.user_id,
            member_id: command.member_id,
            amount,
            reason: command.reason.trim().to_string(),
            deadline: command.deadline,
        };
        new_fine.validate(Utc::now())?;

        self.entries.require_member(command.member_id).await?;

        let mut tx = self.ledger.begin().await?;
        let result = tx.insert_fine(&new_fine).await.map_err(AppError::from);
        let fine = finish(tx, result).await?;

        tracing::info!(
            fine_id = %fine.id,
            member_id = %fine.member_id,
            admin_id = %fine.admin_id,
            amount = fine.amount,
            "Fine charged"
        );
        Ok(fine)
    }

    /// Submit payment for one of the actor's own fines.
    pub async fn pay_fine(&self, actor: &ActorContext, command: PayFineCommand) -> AppResult<FinePayment> {
        let member_id = actor.require_member()?;

        let mut tx = self.ledger.begin().await?;
        let result = self.pay_in(tx.as_mut(), member_id, command).await;
        let payment = finish(tx, result).await?;

        tracing::info!(
            fine_id = %payment.fine.id,
            entry_id = %payment.entry.id,
            member_id = %member_id,
            "Fine payment submitted"
        );
        Ok(payment)
    }

    async fn pay_in(
        &self,
        tx: &mut dyn LedgerTx,
        member_id: Uuid,
        command: PayFineCommand,
    ) -> AppResult<FinePayment> {
        let record = tx
            .lock_fine(command.fine_id)
            .await?
            .filter(|r| r.fine.member_id == member_id)
            .ok_or_else(|| AppError::not_found("fine", command.fine_id))?;

        let view = record.into_view()?;
        view.check_payable(command.amount)?;

        let amount = Amount::new(command.amount).map_err(DomainError::from)?;
        let draft = NewEntry::draft(
            member_id,
            amount,
            command.description,
            Direction::Deposit,
            LedgerType::Fines,
        );
        let (entry, status) = self.entries.insert_with_status(tx, draft).await?;
        let fine = tx.link_fine_entry(view.fine.id, entry.id).await?;

        Ok(FinePayment { fine, entry, status })
    }

    /// Fines visible to `actor`, newest first by default.
    pub async fn list_fines(
        &self,
        actor: &ActorContext,
        mut filter: FineFilter,
        page: &PageRequest,
    ) -> AppResult<Page<FineView>> {
        filter.member_id = actor.scope_member(filter.member_id)?;
        let query = PageQuery::parse(page, FINE_SORT_COLUMNS)?;

        let rows = self.fines.list_fines(&filter, &query).await?;
        let page = Page::from_rows(rows, &query).try_map(FineRecord::into_view)?;

        tracing::debug!(
            count = page.items.len(),
            has_more = page.next_cursor.is_some(),
            "Fines listed"
        );
        Ok(page)
    }

    /// A single fine. Fines of other members are reported as missing.
    pub async fn get_fine(&self, actor: &ActorContext, fine_id: Uuid) -> AppResult<FineView> {
        let record = self
            .fines
            .find_fine(fine_id)
            .await?
            .ok_or_else(|| AppError::not_found("fine", fine_id))?;

        if !actor.is_admin && Some(record.fine.member_id) != actor.member_id {
            return Err(AppError::not_found("fine", fine_id));
        }

        Ok(record.into_view()?)
    }
}
