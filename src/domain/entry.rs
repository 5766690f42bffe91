//! Ledger entries and their approval status
//!
//! An entry is immutable once written. Its status row starts pending and
//! moves exactly once to confirmed or rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::amount::Amount;
use super::error::DomainError;
use super::ledger::{Direction, EntryState, LedgerType};

/// One recorded monetary movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub member_id: Uuid,
    pub amount: i64,
    pub description: String,
    pub reference: String,
    pub direction: Direction,
    pub ledger_type: LedgerType,
    pub created_at: DateTime<Utc>,
}

/// Values needed to insert an entry; the store assigns id and created_at.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub member_id: Uuid,
    pub amount: Amount,
    pub description: String,
    pub reference: String,
    pub direction: Direction,
    pub ledger_type: LedgerType,
}

impl NewEntry {
    /// Draft without a reference; one is assigned per insert attempt.
    pub fn draft(
        member_id: Uuid,
        amount: Amount,
        description: Option<String>,
        direction: Direction,
        ledger_type: LedgerType,
    ) -> Self {
        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| default_description(ledger_type, direction));
        Self {
            member_id,
            amount,
            description,
            reference: String::new(),
            direction,
            ledger_type,
        }
    }

    pub fn with_reference(mut self, reference: String) -> Self {
        self.reference = reference;
        self
    }
}

fn default_description(ledger_type: LedgerType, direction: Direction) -> String {
    match (ledger_type, direction) {
        (LedgerType::RegistrationFee, _) => "Registration fee".to_string(),
        (LedgerType::Fines, Direction::Deposit) => "Fine payment".to_string(),
        (LedgerType::Shares, Direction::Deposit) => "Share purchase".to_string(),
        (LedgerType::Savings, Direction::Deposit) => "Savings deposit".to_string(),
        (LedgerType::SpecialDeposit, Direction::Deposit) => "Special deposit".to_string(),
        (ledger, Direction::Withdrawal) => format!("{} withdrawal", ledger.as_str().to_lowercase().replace('_', " ")),
    }
}

/// Approval record attached 1:1 to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryStatus {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl EntryStatus {
    /// Derive the approval state.
    ///
    /// # Errors
    /// `DomainError::CorruptStatus` when both terminal timestamps are set.
    pub fn state(&self) -> Result<EntryState, DomainError> {
        match (self.confirmed_at, self.rejected_at) {
            (None, None) => Ok(EntryState::Pending),
            (Some(_), None) => Ok(EntryState::Confirmed),
            (None, Some(_)) => Ok(EntryState::Rejected),
            (Some(_), Some(_)) => {
                tracing::error!(
                    status_id = %self.id,
                    entry_id = %self.entry_id,
                    "status row is both confirmed and rejected"
                );
                Err(DomainError::CorruptStatus { status_id: self.id })
            }
        }
    }
}

/// Read model: an entry with its nested status and derived state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub status: EntryStatus,
    pub state: EntryState,
}

impl EntryView {
    pub fn new(entry: LedgerEntry, status: EntryStatus) -> Result<Self, DomainError> {
        let state = status.state()?;
        Ok(Self {
            entry,
            status,
            state,
        })
    }
}

/// The wanted terminal state of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirm,
    Reject,
}

impl Decision {
    pub fn from_confirmed(confirmed: bool) -> Self {
        if confirmed {
            Decision::Confirm
        } else {
            Decision::Reject
        }
    }

    pub fn target(&self) -> EntryState {
        match self {
            Decision::Confirm => EntryState::Confirmed,
            Decision::Reject => EntryState::Rejected,
        }
    }

    pub fn is_confirm(&self) -> bool {
        matches!(self, Decision::Confirm)
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            Decision::Confirm => "transaction confirmed successfully",
            Decision::Reject => "transaction rejected successfully",
        }
    }

    pub fn already_message(&self) -> &'static str {
        match self {
            Decision::Confirm => "transaction already confirmed",
            Decision::Reject => "transaction already rejected",
        }
    }

    /// Outcome of applying this decision to a status that is already terminal.
    ///
    /// `Ok(true)` means the same decision already happened; `Ok(false)` means
    /// the status is still pending and the write must go ahead.
    pub fn check_against(&self, current: EntryState) -> Result<bool, DomainError> {
        match (self, current) {
            (_, EntryState::Pending) => Ok(false),
            (Decision::Confirm, EntryState::Confirmed) | (Decision::Reject, EntryState::Rejected) => {
                Ok(true)
            }
            (Decision::Confirm, EntryState::Rejected) => Err(DomainError::InvalidTransition(
                "cannot confirm a rejected transaction",
            )),
            (Decision::Reject, EntryState::Confirmed) => Err(DomainError::InvalidTransition(
                "cannot reject a confirmed transaction",
            )),
        }
    }
}
