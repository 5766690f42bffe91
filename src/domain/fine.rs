//! Fines
//!
//! A fine is charged standalone, gains an entry link when the member submits
//! payment, and is only settled when that entry is confirmed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::amount::Amount;
use super::entry::EntryView;
use super::error::DomainError;
use super::ledger::EntryState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fine {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub member_id: Uuid,
    pub entry_id: Option<Uuid>,
    pub amount: i64,
    pub reason: String,
    pub deadline: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Fine {
    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewFine {
    pub admin_id: Uuid,
    pub member_id: Uuid,
    pub amount: Amount,
    pub reason: String,
    pub deadline: DateTime<Utc>,
}

impl NewFine {
    /// Validate a fine about to be charged at `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.reason.trim().is_empty() {
            return Err(DomainError::EmptyReason);
        }
        if self.deadline <= now {
            return Err(DomainError::DeadlineNotInFuture);
        }
        Ok(())
    }
}

/// Read model: a fine with its optional payment entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FineView {
    #[serde(flatten)]
    pub fine: Fine,
    pub paid: bool,
    pub payment: Option<EntryView>,
}

impl FineView {
    pub fn new(fine: Fine, payment: Option<EntryView>) -> Self {
        Self {
            paid: fine.is_paid(),
            fine,
            payment,
        }
    }

    /// Check that a payment of `amount` may be submitted for this fine.
    pub fn check_payable(&self, amount: i64) -> Result<(), DomainError> {
        if self.fine.is_paid() {
            return Err(DomainError::FineAlreadyPaid);
        }
        match self.payment.as_ref().map(|p| p.state) {
            Some(EntryState::Pending) => return Err(DomainError::FinePaymentPending),
            // paid_at lags a confirmed entry only if settlement was skipped
            Some(EntryState::Confirmed) => return Err(DomainError::FineAlreadyPaid),
            Some(EntryState::Rejected) | None => {}
        }
        if amount != self.fine.amount {
            return Err(DomainError::FineAmountMismatch {
                expected: self.fine.amount,
                got: amount,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entry::{EntryStatus, LedgerEntry};
    use crate::domain::ledger::{Direction, LedgerType};
    use chrono::Duration;

    fn fine(paid: bool) -> Fine {
        let now = Utc::now();
        Fine {
            id: Uuid::new_v4(),
            admin_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            entry_id: None,
            amount: 2_000,
            reason: "Late to meeting".to_string(),
            deadline: now + Duration::days(7),
            paid_at: paid.then_some(now),
            created_at: now,
            updated_at: now,
        }
    }

    fn payment(fine: &Fine, confirmed: bool, rejected: bool) -> EntryView {
        let now = Utc::now();
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            member_id: fine.member_id,
            amount: fine.amount,
            description: "Fine payment".to_string(),
            reference: "REF000000001".to_string(),
            direction: Direction::Deposit,
            ledger_type: LedgerType::Fines,
            created_at: now,
        };
        let status = EntryStatus {
            id: Uuid::new_v4(),
            entry_id: entry.id,
            confirmed_at: confirmed.then_some(now),
            rejected_at: rejected.then_some(now),
            created_at: now,
        };
        EntryView::new(entry, status).unwrap()
    }

    #[test]
    fn test_deadline_must_be_future() {
        let now = Utc::now();
        let mut new_fine = NewFine {
            admin_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            amount: Amount::new(500).unwrap(),
            reason: "Absent".to_string(),
            deadline: now,
        };
        assert_eq!(new_fine.validate(now), Err(DomainError::DeadlineNotInFuture));

        new_fine.deadline = now + Duration::seconds(1);
        assert!(new_fine.validate(now).is_ok());

        new_fine.reason = "   ".to_string();
        assert_eq!(new_fine.validate(now), Err(DomainError::EmptyReason));
    }

    #[test]
    fn test_payable_checks() {
        let unpaid = FineView::new(fine(false), None);
        assert!(unpaid.check_payable(2_000).is_ok());
        assert_eq!(
            unpaid.check_payable(1_999),
            Err(DomainError::FineAmountMismatch {
                expected: 2_000,
                got: 1_999
            })
        );

        let paid = FineView::new(fine(true), None);
        assert!(paid.paid);
        assert_eq!(paid.check_payable(2_000), Err(DomainError::FineAlreadyPaid));
    }

    #[test]
    fn test_pending_payment_blocks_and_rejected_allows() {
        let f = fine(false);
        let pending = FineView::new(f.clone(), Some(payment(&f, false, false)));
        assert_eq!(pending.check_payable(2_000), Err(DomainError::FinePaymentPending));

        let rejected = FineView::new(f.clone(), Some(payment(&f, false, true)));
        assert!(rejected.check_payable(2_000).is_ok());
    }
}
