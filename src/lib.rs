//! coop_ledger Library
//!
//! Re-exports modules for integration testing and external use.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod pagination;
pub mod store;

pub use config::Config;
pub use domain::{ActorContext, Amount, AmountError, DomainError};
pub use error::{AppError, AppResult, ErrorKind};
pub use handlers::LedgerServices;
