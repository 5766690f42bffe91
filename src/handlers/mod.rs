//! Command Handlers module
//!
//! Handlers orchestrate the ledger operations over the persistence ports in
//! [`crate::store`]. Each one validates its input, runs its writes in a single
//! transaction and logs the outcome.

mod balance;
mod commands;
mod decision;
mod entries;
mod fines;
mod shares;
mod unit_price;


use std::sync::Arc;

pub use balance::BalanceHandler;
pub use commands::*;
pub use decision::DecisionHandler;
pub use entries::{random_reference, EntryHandler, ReferenceGenerator};
pub use fines::FineHandler;
pub use shares::ShareHandler;
pub use unit_price::{UnitPriceHandler, DEFAULT_PRICE_TTL};

use crate::store::{FineStore, LedgerStore, MemberStore, ShareStore};

/// Every handler, wired over one store.
#[derive(Clone)]
pub struct LedgerServices {
    pub entries: EntryHandler,
    pub decisions: DecisionHandler,
    pub balances: BalanceHandler,
    pub prices: UnitPriceHandler,
    pub shares: ShareHandler,
    pub fines: FineHandler,
}

impl LedgerServices {
    pub fn new<S>(store: Arc<S>, prices: UnitPriceHandler) -> Self
    where
        S: LedgerStore + FineStore + ShareStore + MemberStore + 'static,
    {
        Self::with_entries(
            store.clone(),
            EntryHandler::new(store.clone(), store),
            prices,
        )
    }

    /// Wire the handlers around a preconfigured [`EntryHandler`].
    pub fn with_entries<S>(store: Arc<S>, entries: EntryHandler, prices: UnitPriceHandler) -> Self
    where
        S: LedgerStore + FineStore + ShareStore + MemberStore + 'static,
    {
        Self {
            decisions: DecisionHandler::new(store.clone()),
            balances: BalanceHandler::new(store.clone(), store.clone()),
            shares: ShareHandler::new(store.clone(), entries.clone(), prices.clone()),
            fines: FineHandler::new(store.clone(), store, entries.clone()),
            entries,
            prices,
        }
    }
}
