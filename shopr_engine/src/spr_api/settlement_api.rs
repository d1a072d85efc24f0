use std::fmt::Debug;

use chrono::Utc;

use crate::{
    db_types::{Payout, PayoutStatus, Transaction, TransactionStatus},
    traits::{MarketplaceDatabase, MarketplaceError},
};

/// `SettlementApi` is the handoff surface for the external payment collaborator.
///
/// The award flow leaves a `pending` transaction behind; a payment worker drives it through
/// `processing -> completed/failed` here and creates the payout once the charge settles. This engine never calls a
/// payment rail itself.
pub struct SettlementApi<B> {
    db: B,
}

impl<B> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B> SettlementApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> SettlementApi<B>
where B: MarketplaceDatabase
{
    pub async fn fetch_transaction(&self, transaction_id: i64) -> Result<Option<Transaction>, MarketplaceError> {
        self.db.fetch_transaction(transaction_id).await
    }

    pub async fn fetch_transaction_for_list(&self, list_id: i64) -> Result<Option<Transaction>, MarketplaceError> {
        self.db.fetch_transaction_for_list(list_id).await
    }

    /// Advances a transaction along the settlement state machine. Illegal moves are rejected with
    /// [`MarketplaceError::TransitionForbidden`]; reaching `completed` or `failed` stamps the completion time.
    pub async fn update_transaction_status(
        &self,
        transaction_id: i64,
        to: TransactionStatus,
    ) -> Result<Transaction, MarketplaceError> {
        self.db.update_transaction_status(transaction_id, to, Utc::now()).await
    }

    /// Creates the pending payout of the shopper's share of a completed transaction. One payout per transaction.
    pub async fn create_payout(&self, transaction_id: i64) -> Result<Payout, MarketplaceError> {
        self.db.create_payout(transaction_id).await
    }

    pub async fn fetch_payout_for_transaction(&self, transaction_id: i64) -> Result<Option<Payout>, MarketplaceError> {
        self.db.fetch_payout_for_transaction(transaction_id).await
    }

    pub async fn update_payout_status(&self, payout_id: i64, to: PayoutStatus) -> Result<Payout, MarketplaceError> {
        self.db.update_payout_status(payout_id, to, Utc::now()).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
