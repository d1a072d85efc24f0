use std::fmt::Debug;

use chrono::Utc;
use log::*;
use shopr_common::Money;

use crate::{
    db_types::{Bid, BidHistory, NewBid},
    events::{BidAwardedEvent, EventProducers},
    market_objects::BidListing,
    traits::{AwardOutcome, MarketplaceDatabase, MarketplaceError},
};

/// `BidFlowApi` is the primary API for the bid ledger and the award flow: shoppers place, amend and withdraw bids
/// here, and the client's accept action lands in [`Self::award_bid`].
pub struct BidFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for BidFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BidFlowApi")
    }
}

impl<B> BidFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> BidFlowApi<B>
where B: MarketplaceDatabase
{
    /// Submits a new bid on an open list.
    ///
    /// A shopper gets one bid per list; re-submitting fails with [`MarketplaceError::BidAlreadyExists`] and the way
    /// to change a price is [`Self::amend_bid`]. Bidding at or after the deadline is rejected even when the stored
    /// list status has not caught up yet.
    pub async fn place_bid(&self, bid: NewBid) -> Result<Bid, MarketplaceError> {
        validate_bid_details(&bid)?;
        let bid = self.db.place_bid(bid, Utc::now()).await?;
        debug!("🛒️ Shopper {} is bidding {} on list {}", bid.shopper_id, bid.amount, bid.shopping_list_id);
        Ok(bid)
    }

    /// Changes the amount of an active bid, leaving an audit record of the old and new amounts.
    pub async fn amend_bid(
        &self,
        bid_id: i64,
        new_amount: Money,
        changed_by: Option<i64>,
    ) -> Result<Bid, MarketplaceError> {
        if !new_amount.is_positive() {
            return Err(MarketplaceError::Validation(format!("Bid amount must be positive, got {new_amount}")));
        }
        self.db.amend_bid(bid_id, new_amount, changed_by, Utc::now()).await
    }

    pub async fn withdraw_bid(&self, bid_id: i64) -> Result<Bid, MarketplaceError> {
        self.db.withdraw_bid(bid_id).await
    }

    /// The client's accept action: awards the bid, closes out its siblings, assigns the shopper and records the
    /// pending transaction, all atomically. Exactly one of any set of concurrent award attempts on a list succeeds.
    ///
    /// Subscribers to the bid-awarded hook are notified after the award has committed.
    pub async fn award_bid(&self, list_id: i64, bid_id: i64) -> Result<AwardOutcome, MarketplaceError> {
        let outcome = self.db.award_bid(list_id, bid_id, Utc::now()).await?;
        self.call_bid_awarded_hook(&outcome).await;
        info!(
            "🛒️ List {} awarded to shopper {} at {} (transaction {})",
            outcome.list.id,
            outcome.winning_bid.shopper_id,
            outcome.winning_bid.amount,
            outcome.transaction.id
        );
        Ok(outcome)
    }

    async fn call_bid_awarded_hook(&self, outcome: &AwardOutcome) {
        for emitter in &self.producers.bid_awarded_producer {
            debug!("🛒️ Notifying bid awarded hook subscribers");
            let event = BidAwardedEvent::new(
                outcome.list.clone(),
                outcome.winning_bid.clone(),
                outcome.transaction.clone(),
            );
            emitter.publish_event(event).await;
        }
    }

    pub async fn fetch_bid(&self, bid_id: i64) -> Result<Option<Bid>, MarketplaceError> {
        self.db.fetch_bid(bid_id).await
    }

    /// The current cheapest active bid on a list, if any. The earliest-created bid wins a price tie.
    pub async fn lowest_active_bid(&self, list_id: i64) -> Result<Option<Bid>, MarketplaceError> {
        self.db.lowest_active_bid(list_id).await
    }

    /// Active bids ascending by amount, joined with each shopper's display name and average rating.
    pub async fn active_bids(&self, list_id: i64) -> Result<Vec<BidListing>, MarketplaceError> {
        self.db.active_bids(list_id).await
    }

    /// The amendment audit trail for a bid, most recent first.
    pub async fn bid_history(&self, bid_id: i64) -> Result<Vec<BidHistory>, MarketplaceError> {
        self.db.bid_history(bid_id).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

fn validate_bid_details(bid: &NewBid) -> Result<(), MarketplaceError> {
    if !bid.amount.is_positive() {
        return Err(MarketplaceError::Validation(format!("Bid amount must be positive, got {}", bid.amount)));
    }
    if bid.estimated_minutes < 0 {
        return Err(MarketplaceError::Validation(format!(
            "Estimated shopping time cannot be negative, got {} minutes",
            bid.estimated_minutes
        )));
    }
    if !bid.distance_to_store.is_finite() || bid.distance_to_store < 0.0 {
        return Err(MarketplaceError::Validation(format!(
            "Distance to store must be a non-negative number, got {}",
            bid.distance_to_store
        )));
    }
    Ok(())
}
