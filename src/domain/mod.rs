//! Domain module
//!
//! Core ledger types and the pure business rules around them.

pub mod amount;
pub mod context;
pub mod entry;
pub mod error;
pub mod fine;
pub mod ledger;
pub mod member;
pub mod policy;
pub mod share;

pub use amount::{Amount, AmountError};
pub use context::ActorContext;
pub use entry::{Decision, EntryStatus, EntryView, LedgerEntry, NewEntry};
pub use error::DomainError;
pub use fine::{Fine, FineView, NewFine};
pub use ledger::{Direction, EntryState, LedgerType};
pub use member::Member;
pub use share::{NewShareLot, ShareLot, ShareQuote, ShareTotals, ShareUnits, UnitPrice, SCALE};
