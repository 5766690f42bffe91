//! Ledger enums
//!
//! Wire and storage representations are upper snake case strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::DomainError;

/// Bookkeeping category of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerType {
    Savings,
    SpecialDeposit,
    Shares,
    Fines,
    RegistrationFee,
}

impl LedgerType {
    pub const ALL: [LedgerType; 5] = [
        LedgerType::Savings,
        LedgerType::SpecialDeposit,
        LedgerType::Shares,
        LedgerType::Fines,
        LedgerType::RegistrationFee,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerType::Savings => "SAVINGS",
            LedgerType::SpecialDeposit => "SPECIAL_DEPOSIT",
            LedgerType::Shares => "SHARES",
            LedgerType::Fines => "FINES",
            LedgerType::RegistrationFee => "REGISTRATION_FEE",
        }
    }
}

impl fmt::Display for LedgerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LedgerType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::UnknownVariant {
                kind: "ledger type",
                value: s.to_string(),
            })
    }
}

/// Whether money moves into or out of the member's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Deposit,
    Withdrawal,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Deposit => "DEPOSIT",
            Direction::Withdrawal => "WITHDRAWAL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(Direction::Deposit),
            "WITHDRAWAL" => Ok(Direction::Withdrawal),
            other => Err(DomainError::UnknownVariant {
                kind: "direction",
                value: other.to_string(),
            }),
        }
    }
}

/// Derived approval state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryState {
    Pending,
    Confirmed,
    Rejected,
}

impl EntryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryState::Pending => "PENDING",
            EntryState::Confirmed => "CONFIRMED",
            EntryState::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(EntryState::Pending),
            "CONFIRMED" => Ok(EntryState::Confirmed),
            "REJECTED" => Ok(EntryState::Rejected),
            other => Err(DomainError::UnknownVariant {
                kind: "status",
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_type_wire_format() {
        let json = serde_json::to_string(&LedgerType::SpecialDeposit).unwrap();
        assert_eq!(json, "\"SPECIAL_DEPOSIT\"");

        let parsed: LedgerType = serde_json::from_str("\"REGISTRATION_FEE\"").unwrap();
        assert_eq!(parsed, LedgerType::RegistrationFee);
    }

    #[test]
    fn test_as_str_matches_serde() {
        for ledger in LedgerType::ALL {
            let json = serde_json::to_string(&ledger).unwrap();
            assert_eq!(json, format!("\"{}\"", ledger.as_str()));
            assert_eq!(ledger.as_str().parse::<LedgerType>().unwrap(), ledger);
        }
    }

    #[test]
    fn test_unknown_values_rejected() {
        assert!("savings".parse::<LedgerType>().is_err());
        assert!("CREDIT".parse::<Direction>().is_err());
        assert!("DONE".parse::<EntryState>().is_err());
    }

    #[test]
    fn test_state_wire_format() {
        assert_eq!(serde_json::to_string(&EntryState::Pending).unwrap(), "\"PENDING\"");
        assert_eq!("REJECTED".parse::<EntryState>().unwrap(), EntryState::Rejected);
    }
}
