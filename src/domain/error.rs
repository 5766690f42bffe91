//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;
use uuid::Uuid;

use super::ledger::LedgerType;

/// Business rule violations and domain invariant failures.
///
/// These are independent of the web/infrastructure layer; `AppError`
/// classifies them with `is_client_error` / `is_conflict_error`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Invalid amount (zero or negative)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("{ledger} deposit must be at least {minimum} (got {amount})")]
    BelowMinimum {
        ledger: LedgerType,
        minimum: i64,
        amount: i64,
    },

    #[error("registration fee must be exactly {expected} (got {got})")]
    RegistrationFeeMismatch { expected: i64, got: i64 },

    /// Ledger type that only its own operation may write
    #[error("{0} entries cannot be created directly")]
    DedicatedLedger(LedgerType),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("deadline must be in the future")]
    DeadlineNotInFuture,

    #[error("reason must not be empty")]
    EmptyReason,

    #[error("payment amount {got} does not match fine amount {expected}")]
    FineAmountMismatch { expected: i64, got: i64 },

    #[error("amount is too small to purchase any shares")]
    AmountTooSmall,

    #[error("units mismatch: expected {expected}, got {got}")]
    UnitsMismatch { expected: String, got: String },

    #[error("unit price is not set")]
    UnitPriceUnavailable,

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    /// Opposite terminal state already reached
    #[error("{0}")]
    InvalidTransition(&'static str),

    #[error("fine already paid")]
    FineAlreadyPaid,

    #[error("fine payment already pending")]
    FinePaymentPending,

    #[error("member already activated")]
    MemberAlreadyActivated,

    /// Cross-member access denied
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// confirmed_at and rejected_at both set on one status row
    #[error("status {status_id} is both confirmed and rejected")]
    CorruptStatus { status_id: Uuid },
}

impl From<super::amount::AmountError> for DomainError {
    fn from(err: super::amount::AmountError) -> Self {
        DomainError::InvalidAmount(err.to_string())
    }
}

impl DomainError {
    pub fn insufficient_balance(required: i64, available: i64) -> Self {
        Self::InsufficientBalance {
            required,
            available,
        }
    }

    /// Check if this is a client error (user's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::BelowMinimum { .. }
                | Self::RegistrationFeeMismatch { .. }
                | Self::DedicatedLedger(_)
                | Self::InsufficientBalance { .. }
                | Self::DeadlineNotInFuture
                | Self::EmptyReason
                | Self::FineAmountMismatch { .. }
                | Self::AmountTooSmall
                | Self::UnitsMismatch { .. }
                | Self::UnknownVariant { .. }
        )
    }

    /// Check if this is a conflict with current persisted state
    pub fn is_conflict_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition(_)
                | Self::FineAlreadyPaid
                | Self::FinePaymentPending
                | Self::MemberAlreadyActivated
        )
    }
}
