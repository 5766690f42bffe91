//! Command definitions
//!
//! Commands carry the caller's intent into a handler; the result structs are
//! what handlers hand back to the API layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Direction, EntryState, EntryStatus, Fine, LedgerEntry, LedgerType, ShareLot, ShareQuote,
};

// =========================================================================
// Entries
// =========================================================================

/// Record a deposit or withdrawal awaiting approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEntryCommand {
    pub member_id: Uuid,
    /// Minor currency units; must be positive
    pub amount: i64,
    pub description: Option<String>,
    pub direction: Direction,
    pub ledger_type: LedgerType,
}

impl CreateEntryCommand {
    pub fn new(member_id: Uuid, amount: i64, direction: Direction, ledger_type: LedgerType) -> Self {
        Self {
            member_id,
            amount,
            description: None,
            direction,
            ledger_type,
        }
    }

    pub fn deposit(member_id: Uuid, amount: i64, ledger_type: LedgerType) -> Self {
        Self::new(member_id, amount, Direction::Deposit, ledger_type)
    }

    pub fn withdrawal(member_id: Uuid, amount: i64, ledger_type: LedgerType) -> Self {
        Self::new(member_id, amount, Direction::Withdrawal, ledger_type)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An entry together with its freshly created pending status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryCreated {
    pub entry: LedgerEntry,
    pub status: EntryStatus,
}

// =========================================================================
// Decisions
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionCommand {
    pub status_id: Uuid,
    pub confirmed: bool,
    /// Refuse to act on a status whose entry is of another ledger type
    pub expected_ledger: Option<LedgerType>,
}

impl DecisionCommand {
    pub fn confirm(status_id: Uuid) -> Self {
        Self {
            status_id,
            confirmed: true,
            expected_ledger: None,
        }
    }

    pub fn reject(status_id: Uuid) -> Self {
        Self {
            status_id,
            confirmed: false,
            expected_ledger: None,
        }
    }

    pub fn with_expected_ledger(mut self, ledger_type: LedgerType) -> Self {
        self.expected_ledger = Some(ledger_type);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionResult {
    pub status_id: Uuid,
    pub confirmed: bool,
    /// false when the same decision had already been applied
    pub changed: bool,
    pub state: EntryState,
    pub message: String,
}

// =========================================================================
// Shares
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuySharesCommand {
    pub member_id: Uuid,
    pub amount: i64,
    /// Units the caller expects to receive, checked against the quote
    pub units: Option<Decimal>,
}

impl BuySharesCommand {
    pub fn new(member_id: Uuid, amount: i64) -> Self {
        Self {
            member_id,
            amount,
            units: None,
        }
    }

    pub fn with_units(mut self, units: Decimal) -> Self {
        self.units = Some(units);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharePurchase {
    pub entry: LedgerEntry,
    pub status: EntryStatus,
    pub lot: ShareLot,
    pub quote: ShareQuote,
}

// =========================================================================
// Fines
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeFineCommand {
    pub member_id: Uuid,
    pub amount: i64,
    pub reason: String,
    pub deadline: DateTime<Utc>,
}

impl ChargeFineCommand {
    pub fn new(
        member_id: Uuid,
        amount: i64,
        reason: impl Into<String>,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            member_id,
            amount,
            reason: reason.into(),
            deadline,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayFineCommand {
    pub fine_id: Uuid,
    pub amount: i64,
    pub description: Option<String>,
}

impl PayFineCommand {
    pub fn new(fine_id: Uuid, amount: i64) -> Self {
        Self {
            fine_id,
            amount,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The fine as linked to its new payment entry. `paid_at` stays unset until
/// the entry is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinePayment {
    pub fine: Fine,
    pub entry: LedgerEntry,
    pub status: EntryStatus,
}
