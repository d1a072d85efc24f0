use crate::{
    db_types::{Bid, BidHistory, Payout, Review, ShoppingList, Transaction, User},
    market_objects::{BidListing, ListQueryFilter},
    traits::MarketplaceError,
};

/// Read-side behaviour every backend must provide. None of these methods mutate state.
#[allow(async_fn_in_trait)]
pub trait ListingManagement {
    /// Fetches a shopping list by id, or `None` if it does not exist. The stored status is returned as-is; callers
    /// that need the deadline-adjusted view should go through the write flows, which apply due transitions first.
    async fn fetch_list(&self, list_id: i64) -> Result<Option<ShoppingList>, MarketplaceError>;

    /// Fetches lists according to the filter, newest first.
    async fn search_lists(&self, query: ListQueryFilter) -> Result<Vec<ShoppingList>, MarketplaceError>;

    async fn fetch_bid(&self, bid_id: i64) -> Result<Option<Bid>, MarketplaceError>;

    /// The active bids on a list, ascending by amount (ties broken by earliest creation), each joined with the
    /// bidding shopper's display name and average rating for client-side presentation.
    async fn active_bids(&self, list_id: i64) -> Result<Vec<BidListing>, MarketplaceError>;

    /// The current lowest active bid on a list, or `None` if there are no active bids. Ties are broken by earliest
    /// creation time: the first shopper to offer a price keeps the advantage.
    async fn lowest_active_bid(&self, list_id: i64) -> Result<Option<Bid>, MarketplaceError>;

    /// The amendment audit trail for a bid, most recent first.
    async fn bid_history(&self, bid_id: i64) -> Result<Vec<BidHistory>, MarketplaceError>;

    async fn fetch_transaction(&self, transaction_id: i64) -> Result<Option<Transaction>, MarketplaceError>;

    async fn fetch_transaction_for_list(&self, list_id: i64) -> Result<Option<Transaction>, MarketplaceError>;

    async fn fetch_payout_for_transaction(&self, transaction_id: i64) -> Result<Option<Payout>, MarketplaceError>;

    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, MarketplaceError>;

    /// All reviews received by a user, newest first.
    async fn reviews_for(&self, reviewee_id: i64) -> Result<Vec<Review>, MarketplaceError>;

    /// The user's current average rating as maintained by the review flow.
    async fn average_rating(&self, user_id: i64) -> Result<f64, MarketplaceError>;
}
