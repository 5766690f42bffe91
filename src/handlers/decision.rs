//! Decision Handler
//!
//! Confirms or rejects a pending entry status exactly once. Concurrent
//! decisions are settled by the conditional update in
//! [`LedgerTx::decide_status`]; the loser re-reads and reports what won.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{Decision, EntryStatus, LedgerType};
use crate::error::{AppError, AppResult};
use crate::store::{finish, LedgerStore, LedgerTx, StatusRecord};

use super::{DecisionCommand, DecisionResult};

#[derive(Clone)]
pub struct DecisionHandler {
    ledger: Arc<dyn LedgerStore>,
}

impl DecisionHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Apply a confirm or reject decision.
    ///
    /// Repeating the decision that already happened succeeds with
    /// `changed = false`; asking for the opposite one is a conflict.
    pub async fn apply_decision(&self, command: DecisionCommand) -> AppResult<DecisionResult> {
        let decision = Decision::from_confirmed(command.confirmed);
        let record = self.load(&command).await?;

        if decision.check_against(record.status.state()?)? {
            return Ok(unchanged(&record, decision));
        }

        let mut tx = self.ledger.begin().await?;
        let result = self.decide_in(tx.as_mut(), &record, decision).await;
        let decided = finish(tx, result).await?;

        match decided {
            Some(status) => {
                tracing::info!(
                    status_id = %status.id,
                    entry_id = %status.entry_id,
                    ledger_type = %record.ledger_type,
                    decision = ?decision,
                    "Entry status decided"
                );
                Ok(DecisionResult {
                    status_id: status.id,
                    confirmed: decision.is_confirm(),
                    changed: true,
                    state: decision.target(),
                    message: decision.success_message().to_string(),
                })
            }
            None => {
                // lost the race; report whatever the winner wrote
                let record = self.load(&command).await?;
                if decision.check_against(record.status.state()?)? {
                    tracing::debug!(status_id = %record.status.id, "Concurrent identical decision");
                    return Ok(unchanged(&record, decision));
                }
                Err(AppError::Internal(format!(
                    "status {} still pending after conditional update",
                    record.status.id
                )))
            }
        }
    }

    async fn load(&self, command: &DecisionCommand) -> AppResult<StatusRecord> {
        let record = self
            .ledger
            .find_status(command.status_id)
            .await?
            .ok_or_else(|| AppError::not_found("status", command.status_id))?;

        match command.expected_ledger {
            Some(expected) if expected != record.ledger_type => {
                Err(AppError::not_found(expected.as_str(), command.status_id))
            }
            _ => Ok(record),
        }
    }

    async fn decide_in(
        &self,
        tx: &mut dyn LedgerTx,
        record: &StatusRecord,
        decision: Decision,
    ) -> AppResult<Option<EntryStatus>> {
        let now = Utc::now();
        let Some(status) = tx.decide_status(record.status.id, decision, now).await? else {
            return Ok(None);
        };

        if decision.is_confirm() {
            apply_confirm_effects(tx, record, &status, now).await?;
        }
        Ok(Some(status))
    }
}

/// Side effects of confirming an entry, written in the deciding transaction.
async fn apply_confirm_effects(
    tx: &mut dyn LedgerTx,
    record: &StatusRecord,
    status: &EntryStatus,
    at: DateTime<Utc>,
) -> AppResult<()> {
    match record.ledger_type {
        LedgerType::RegistrationFee => {
            if tx.activate_member(record.member_id, at).await? {
                tracing::info!(member_id = %record.member_id, "Member activated");
            } else {
                tracing::warn!(
                    member_id = %record.member_id,
                    status_id = %status.id,
                    "Registration fee confirmed for a member already active"
                );
            }
        }
        LedgerType::Fines => match tx.settle_fine(status.entry_id, at).await? {
            Some(fine) => {
                tracing::info!(fine_id = %fine.id, member_id = %fine.member_id, "Fine settled");
            }
            None => {
                tracing::warn!(
                    entry_id = %status.entry_id,
                    "Fine payment confirmed with no unpaid fine linked"
                );
            }
        },
        LedgerType::Savings | LedgerType::SpecialDeposit | LedgerType::Shares => {}
    }
    Ok(())
}

fn unchanged(record: &StatusRecord, decision: Decision) -> DecisionResult {
    DecisionResult {
        status_id: record.status.id,
        confirmed: decision.is_confirm(),
        changed: false,
        state: decision.target(),
        message: decision.already_message().to_string(),
    }
}
