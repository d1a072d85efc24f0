use serde::{Deserialize, Serialize};

use crate::db_types::{Bid, Review, ShoppingList, Transaction};

/// Emitted after an award commits: the list is assigned, losing bids are closed out, and the pending transaction
/// exists. Everything a notification or payment-kickoff subscriber needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidAwardedEvent {
    pub list: ShoppingList,
    pub winning_bid: Bid,
    pub transaction: Transaction,
}

impl BidAwardedEvent {
    pub fn new(list: ShoppingList, winning_bid: Bid, transaction: Transaction) -> Self {
        Self { list, winning_bid, transaction }
    }
}

/// Emitted after a review is recorded and the reviewee's average rating has been recomputed. The rating recompute
/// itself is synchronous with the insert; this event only makes the coupling observable to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecordedEvent {
    pub review: Review,
    pub new_average: f64,
}

impl ReviewRecordedEvent {
    pub fn new(review: Review, new_average: f64) -> Self {
        Self { review, new_average }
    }
}

/// Emitted by the sweep worker for each list it moved from `open` to `bidding_closed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiddingClosedEvent {
    pub list: ShoppingList,
}

impl BiddingClosedEvent {
    pub fn new(list: ShoppingList) -> Self {
        Self { list }
    }
}

#[derive(Debug, Clone)]
pub enum EventType {
    BidAwarded(BidAwardedEvent),
    ReviewRecorded(ReviewRecordedEvent),
    BiddingClosed(BiddingClosedEvent),
}
