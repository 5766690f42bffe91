//! Share Handler
//!
//! Quotes and purchases of cooperative shares. A purchase is a SHARES deposit
//! entry plus a share lot recording the units bought at the quoted price.

use std::sync::Arc;

use crate::domain::{
    Amount, Direction, DomainError, LedgerType, NewEntry, NewShareLot, ShareQuote,
};
use crate::error::AppResult;
use crate::store::{finish, LedgerStore, LedgerTx};

use super::entries::EntryHandler;
use super::unit_price::UnitPriceHandler;
use super::{BuySharesCommand, SharePurchase};

#[derive(Clone)]
pub struct ShareHandler {
    ledger: Arc<dyn LedgerStore>,
    entries: EntryHandler,
    prices: UnitPriceHandler,
}

impl ShareHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>, entries: EntryHandler, prices: UnitPriceHandler) -> Self {
        Self {
            ledger,
            entries,
            prices,
        }
    }

    /// Units `amount` buys at the current unit price.
    pub async fn get_quote(&self, amount: i64) -> AppResult<ShareQuote> {
        if amount <= 0 {
            return Err(DomainError::InvalidAmount(format!(
                "amount must be positive (got {amount})"
            ))
            .into());
        }
        let unit_price = self.prices.get_unit_price().await?;
        Ok(ShareQuote::compute(amount, unit_price)?)
    }

    /// Buy shares for `amount`. The entry stays pending until an admin
    /// confirms it; only then do the units count towards totals.
    pub async fn buy_shares(&self, command: BuySharesCommand) -> AppResult<SharePurchase> {
        let quote = self.get_quote(command.amount).await?;
        if quote.units.is_zero() {
            return Err(DomainError::AmountTooSmall.into());
        }

        if let Some(supplied) = command.units {
            if !quote.units.matches(supplied) {
                return Err(DomainError::UnitsMismatch {
                    expected: quote.units.to_string(),
                    got: supplied.to_string(),
                }
                .into());
            }
        }

        self.entries.require_member(command.member_id).await?;

        let amount = Amount::new(quote.amount).map_err(DomainError::from)?;
        let draft = NewEntry::draft(
            command.member_id,
            amount,
            Some(quote.purchase_description()),
            Direction::Deposit,
            LedgerType::Shares,
        );

        let mut tx = self.ledger.begin().await?;
        let result = self.purchase_in(tx.as_mut(), draft, quote).await;
        let purchase = finish(tx, result).await?;

        tracing::info!(
            entry_id = %purchase.entry.id,
            member_id = %purchase.entry.member_id,
            units = %quote.units,
            unit_price = quote.unit_price,
            remainder = quote.remainder,
            "Share purchase recorded"
        );
        Ok(purchase)
    }

    async fn purchase_in(
        &self,
        tx: &mut dyn LedgerTx,
        draft: NewEntry,
        quote: ShareQuote,
    ) -> AppResult<SharePurchase> {
        let (entry, status) = self.entries.insert_with_status(tx, draft).await?;
        let lot = tx
            .insert_share_lot(&NewShareLot {
                entry_id: entry.id,
                units: quote.units,
                unit_price: quote.unit_price,
            })
            .await?;

        Ok(SharePurchase {
            entry,
            status,
            lot,
            quote,
        })
    }
}
