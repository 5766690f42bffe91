//! Balance Handler
//!
//! Balances are derived on read from confirmed entries; nothing is stored.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{LedgerType, ShareTotals};
use crate::error::AppResult;
use crate::store::{LedgerStore, ShareStore};

/// Confirmed deposits minus confirmed withdrawals.
pub(crate) async fn confirmed_balance(
    ledger: &dyn LedgerStore,
    member_id: Uuid,
    ledger_type: LedgerType,
) -> AppResult<i64> {
    let totals = ledger.confirmed_totals(member_id, ledger_type).await?;
    Ok(totals.deposits - totals.withdrawals)
}

#[derive(Clone)]
pub struct BalanceHandler {
    ledger: Arc<dyn LedgerStore>,
    shares: Arc<dyn ShareStore>,
}

impl BalanceHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>, shares: Arc<dyn ShareStore>) -> Self {
        Self { ledger, shares }
    }

    /// Balance of one member in one ledger; 0 when nothing is confirmed.
    pub async fn get_balance(&self, member_id: Uuid, ledger_type: LedgerType) -> AppResult<i64> {
        let balance = confirmed_balance(self.ledger.as_ref(), member_id, ledger_type).await?;
        tracing::debug!(%member_id, %ledger_type, balance, "Balance computed");
        Ok(balance)
    }

    pub async fn member_share_totals(&self, member_id: Uuid) -> AppResult<ShareTotals> {
        Ok(self.shares.share_totals(Some(member_id)).await?)
    }

    /// Confirmed shares across every member.
    pub async fn total_shares(&self) -> AppResult<ShareTotals> {
        Ok(self.shares.share_totals(None).await?)
    }
}
