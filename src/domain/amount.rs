//! Amount type
//!
//! Domain primitive for monetary amounts in minor currency units.
//! Amounts are validated at construction time, so a stored entry can never
//! carry a zero or negative magnitude. Direction is modelled separately.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount represents a validated positive sum of minor units (e.g. kobo, cents).
///
/// # Invariants
/// - Value is always positive (> 0)
///
/// # Example
/// ```
/// use coop_ledger::domain::Amount;
///
/// let amount = Amount::new(75_000).unwrap();
/// assert_eq!(amount.value(), 75_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

/// Errors that can occur when creating an Amount
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount must be positive (got {0})")]
    NotPositive(i64),
}

impl Amount {
    /// Create a new Amount with validation.
    ///
    /// # Errors
    /// - `AmountError::NotPositive` if value <= 0
    pub fn new(value: i64) -> Result<Self, AmountError> {
        if value <= 0 {
            return Err(AmountError::NotPositive(value));
        }
        Ok(Self(value))
    }

    /// Get the underlying minor-unit value.
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Check if this amount covers another one.
    pub fn is_sufficient_for(&self, other: &Amount) -> bool {
        self.0 >= other.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Amount {
    type Error = AmountError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_amount() {
        let amount = Amount::new(1).unwrap();
        assert_eq!(amount.value(), 1);
    }

    #[test]
    fn test_zero_and_negative_rejected() {
        assert_eq!(Amount::new(0), Err(AmountError::NotPositive(0)));
        assert_eq!(Amount::new(-500), Err(AmountError::NotPositive(-500)));
    }

    #[test]
    fn test_serde_rejects_non_positive() {
        let ok: Amount = serde_json::from_str("75000").unwrap();
        assert_eq!(ok.value(), 75_000);

        let err = serde_json::from_str::<Amount>("0");
        assert!(err.is_err());
    }

    #[test]
    fn test_is_sufficient_for() {
        let big = Amount::new(100).unwrap();
        let small = Amount::new(40).unwrap();
        assert!(big.is_sufficient_for(&small));
        assert!(!small.is_sufficient_for(&big));
    }
}
