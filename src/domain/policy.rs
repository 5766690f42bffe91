//! Cooperative policy constants
//!
//! Amounts are in minor currency units.

use super::amount::Amount;
use super::error::DomainError;
use super::ledger::{Direction, LedgerType};

/// Smallest accepted savings deposit.
pub const MIN_SAVINGS_DEPOSIT: i64 = 1_000;

/// Smallest accepted special deposit.
pub const MIN_SPECIAL_DEPOSIT: i64 = 5_000;

/// One-time registration fee; deposits must match exactly.
pub const REGISTRATION_FEE: i64 = 100_000;

/// Share unit price served when no price has ever been set.
pub const DEFAULT_SHARE_UNIT_PRICE: i64 = 50_000;

/// Length of generated entry references.
pub const REFERENCE_LEN: usize = 12;

/// Reference regenerations allowed after uniqueness collisions.
pub const MAX_REFERENCE_ATTEMPTS: usize = 5;

/// Ledgers open to plain deposits and withdrawals. Shares, fines and the
/// registration fee each carry extra state and go through their own operation.
pub fn check_direct_ledger(ledger_type: LedgerType) -> Result<(), DomainError> {
    match ledger_type {
        LedgerType::Savings | LedgerType::SpecialDeposit => Ok(()),
        LedgerType::Shares | LedgerType::Fines | LedgerType::RegistrationFee => {
            Err(DomainError::DedicatedLedger(ledger_type))
        }
    }
}

/// Enforce per-ledger deposit rules before an entry is created.
pub fn check_entry_policy(
    ledger_type: LedgerType,
    direction: Direction,
    amount: Amount,
) -> Result<(), DomainError> {
    if direction != Direction::Deposit {
        return Ok(());
    }

    let minimum = match ledger_type {
        LedgerType::Savings => MIN_SAVINGS_DEPOSIT,
        LedgerType::SpecialDeposit => MIN_SPECIAL_DEPOSIT,
        LedgerType::RegistrationFee => {
            if amount.value() != REGISTRATION_FEE {
                return Err(DomainError::RegistrationFeeMismatch {
                    expected: REGISTRATION_FEE,
                    got: amount.value(),
                });
            }
            return Ok(());
        }
        LedgerType::Shares | LedgerType::Fines => return Ok(()),
    };

    if amount.value() < minimum {
        return Err(DomainError::BelowMinimum {
            ledger: ledger_type,
            minimum,
            amount: amount.value(),
        });
    }
    Ok(())
}
