//! Entry Handler
//!
//! Creates ledger entries with their pending status and lists them.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

use crate::domain::policy::{self, MAX_REFERENCE_ATTEMPTS, REFERENCE_LEN, REGISTRATION_FEE};
use crate::domain::{
    ActorContext, Amount, Direction, DomainError, EntryStatus, EntryView, LedgerEntry, LedgerType,
    Member, NewEntry,
};
use crate::error::{AppError, AppResult};
use crate::pagination::{Page, PageQuery, PageRequest, SortColumn};
use crate::store::{finish, EntryFilter, EntryRecord, LedgerStore, LedgerTx, MemberStore};

use super::balance::confirmed_balance;
use super::{CreateEntryCommand, EntryCreated};

/// Source of candidate entry references.
pub type ReferenceGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Random uppercase-alphanumeric reference of `REFERENCE_LEN` characters.
pub fn random_reference() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFERENCE_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

const ENTRY_SORT_COLUMNS: &[SortColumn] = &[SortColumn::CreatedAt];

#[derive(Clone)]
pub struct EntryHandler {
    ledger: Arc<dyn LedgerStore>,
    members: Arc<dyn MemberStore>,
    next_reference: ReferenceGenerator,
}

impl EntryHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>, members: Arc<dyn MemberStore>) -> Self {
        Self {
            ledger,
            members,
            next_reference: Arc::new(random_reference),
        }
    }

    pub fn with_reference_generator(
        mut self,
        generator: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.next_reference = Arc::new(generator);
        self
    }

    /// Load a member or fail with NotFound.
    pub async fn require_member(&self, member_id: Uuid) -> AppResult<Member> {
        self.members
            .get(member_id)
            .await?
            .ok_or_else(|| AppError::not_found("member", member_id))
    }

    /// Create a savings or special-deposit entry and its pending status in
    /// one transaction.
    pub async fn create_entry(&self, command: CreateEntryCommand) -> AppResult<EntryCreated> {
        let amount = Amount::new(command.amount).map_err(DomainError::from)?;
        policy::check_direct_ledger(command.ledger_type)?;
        self.record_entry(command, amount).await
    }

    async fn record_entry(
        &self,
        command: CreateEntryCommand,
        amount: Amount,
    ) -> AppResult<EntryCreated> {
        policy::check_entry_policy(command.ledger_type, command.direction, amount)?;

        self.require_member(command.member_id).await?;

        if command.direction == Direction::Withdrawal {
            let available =
                confirmed_balance(self.ledger.as_ref(), command.member_id, command.ledger_type)
                    .await?;
            if available < amount.value() {
                return Err(DomainError::insufficient_balance(amount.value(), available).into());
            }
        }

        let draft = NewEntry::draft(
            command.member_id,
            amount,
            command.description,
            command.direction,
            command.ledger_type,
        );

        let mut tx = self.ledger.begin().await?;
        let result = self.insert_with_status(tx.as_mut(), draft).await;
        let (entry, status) = finish(tx, result).await?;

        tracing::info!(
            entry_id = %entry.id,
            status_id = %status.id,
            member_id = %entry.member_id,
            ledger_type = %entry.ledger_type,
            direction = %entry.direction,
            amount = entry.amount,
            "Entry created"
        );

        Ok(EntryCreated { entry, status })
    }

    /// Submit the one-off registration fee for a member not yet activated.
    pub async fn pay_registration_fee(&self, member_id: Uuid, amount: i64) -> AppResult<EntryCreated> {
        if amount != REGISTRATION_FEE {
            return Err(DomainError::RegistrationFeeMismatch {
                expected: REGISTRATION_FEE,
                got: amount,
            }
            .into());
        }

        let member = self.require_member(member_id).await?;
        if member.is_active() {
            return Err(DomainError::MemberAlreadyActivated.into());
        }

        let fee = Amount::new(amount).map_err(DomainError::from)?;
        self.record_entry(
            CreateEntryCommand::deposit(member_id, amount, LedgerType::RegistrationFee)
                .with_description("Registration fee"),
            fee,
        )
        .await
    }

    /// Entries visible to `actor`, newest first unless `page` says otherwise.
    pub async fn list_entries(
        &self,
        actor: &ActorContext,
        mut filter: EntryFilter,
        page: &PageRequest,
    ) -> AppResult<Page<EntryView>> {
        filter.member_id = actor.scope_member(filter.member_id)?;
        let query = PageQuery::parse(page, ENTRY_SORT_COLUMNS)?;

        let rows = self.ledger.list_entries(&filter, &query).await?;
        let page = Page::from_rows(rows, &query).try_map(EntryRecord::into_view)?;

        tracing::debug!(
            count = page.items.len(),
            has_more = page.next_cursor.is_some(),
            "Entries listed"
        );
        Ok(page)
    }

    /// Insert `draft` under a fresh reference, retrying on collisions, then
    /// insert its pending status. Runs inside the caller's transaction.
    pub(crate) async fn insert_with_status(
        &self,
        tx: &mut dyn LedgerTx,
        draft: NewEntry,
    ) -> AppResult<(LedgerEntry, EntryStatus)> {
        for attempt in 1..=MAX_REFERENCE_ATTEMPTS {
            let candidate = draft.clone().with_reference((self.next_reference)());
            match tx.insert_entry(&candidate).await? {
                Some(entry) => {
                    let status = tx.insert_status(entry.id).await?;
                    return Ok((entry, status));
                }
                None => {
                    tracing::warn!(
                        attempt,
                        reference = %candidate.reference,
                        "Entry reference collision, regenerating"
                    );
                }
            }
        }

        Err(AppError::Internal(format!(
            "no unique entry reference after {MAX_REFERENCE_ATTEMPTS} attempts"
        )))
    }
}
