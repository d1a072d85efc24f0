use chrono::{DateTime, Utc};
use shopr_common::Money;
use thiserror::Error;

use crate::{
    db_types::{
        Bid,
        BidStatus,
        ListStatus,
        NewBid,
        NewReview,
        NewShoppingList,
        NewUser,
        Payout,
        PayoutStatus,
        Review,
        ShoppingList,
        Transaction,
        TransactionStatus,
        User,
    },
    traits::{AwardOutcome, ListingManagement},
};

/// This trait defines the highest level of behaviour for backends supporting the Shopr engine.
///
/// This behaviour includes:
/// * The shopping-list lifecycle, including the lazy deadline and expiry transitions.
/// * The bid ledger: placing, amending and withdrawing bids under the one-bid-per-shopper-per-list constraint.
/// * The award flow, which must be atomic and serializable per list.
/// * Review recording with the rating recompute, and the settlement handoff records.
///
/// Flows that depend on the current time take it as an explicit `now` argument so that deadline behaviour is
/// deterministic under test; production callers pass `Utc::now()`.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase: Clone + ListingManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Inserts a user record for the out-of-scope user collaborator. Fails with [`MarketplaceError::UserAlreadyExists`]
    /// on a duplicate email.
    async fn insert_user(&self, user: NewUser) -> Result<User, MarketplaceError>;

    /// Inserts a new shopping list with status `open`. Input validation (time ordering, positive amounts) lives in
    /// [`crate::ListApi::create_list`]; the schema CHECK constraints are the backstop here.
    async fn insert_list(&self, list: NewShoppingList) -> Result<ShoppingList, MarketplaceError>;

    /// Client-initiated cancellation. Legal only while the list's effective status (after applying any due deadline
    /// or expiry transition) is still `open`; a list with an assigned shopper cannot be cancelled this way.
    async fn cancel_list(&self, list_id: i64, now: DateTime<Utc>) -> Result<ShoppingList, MarketplaceError>;

    /// The thin post-award progression: `assigned -> in_progress -> delivered`. Any other move is rejected with
    /// [`MarketplaceError::TransitionForbidden`].
    async fn advance_fulfilment(&self, list_id: i64, to: ListStatus) -> Result<ShoppingList, MarketplaceError>;

    /// Places a bid on an open list.
    ///
    /// In one transaction: applies due lazy transitions to the list, requires the effective status to be `open`
    /// (which also rejects bids at or after the deadline, even when the stored status has not caught up yet), and
    /// inserts the bid. The `(shopper, list)` uniqueness constraint is the guard against duplicate-bid races; a
    /// second insert fails with [`MarketplaceError::BidAlreadyExists`] rather than silently overwriting.
    async fn place_bid(&self, bid: NewBid, now: DateTime<Utc>) -> Result<Bid, MarketplaceError>;

    /// Amends an active bid's amount, recording exactly one audit row with the old and new amounts. The bid must be
    /// `active` and its list effectively `open`.
    async fn amend_bid(
        &self,
        bid_id: i64,
        new_amount: Money,
        changed_by: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Bid, MarketplaceError>;

    /// Withdraws an active bid. Withdrawn bids are excluded from listings and are not touched by a later award.
    async fn withdraw_bid(&self, bid_id: i64) -> Result<Bid, MarketplaceError>;

    /// The award coordinator. In a single serialized, atomic unit:
    /// 1. the target bid becomes `won`;
    /// 2. every sibling bid still `active` becomes `lost`;
    /// 3. the list gets `selected_shopper` and status `assigned`;
    /// 4. a pending [`Transaction`] is created from the fee split of the bid amount.
    ///
    /// Preconditions (checked after applying due lazy transitions): the list exists and is awardable
    /// (`open`/`bidding_closed`); the bid exists, belongs to the list, and is active. A missing, mismatched or
    /// inactive bid reports [`MarketplaceError::BidNotFound`]; an already-assigned or terminal list reports
    /// [`MarketplaceError::InvalidListState`] with the current status. Concurrent awards on the same list serialize:
    /// exactly one commits and the rest observe the assigned list. Transient lock contention is retried a bounded
    /// number of times before surfacing [`MarketplaceError::Concurrency`].
    async fn award_bid(&self, list_id: i64, bid_id: i64, now: DateTime<Utc>) -> Result<AwardOutcome, MarketplaceError>;

    /// Scheduler hook: moves every `open` list whose bidding deadline has passed to `bidding_closed`, returning the
    /// affected lists. The engine is correct without this being called; it only accelerates the lazy transitions.
    async fn close_due_bidding(&self, now: DateTime<Utc>) -> Result<Vec<ShoppingList>, MarketplaceError>;

    /// Scheduler hook: expires every unawarded list whose expiry time has passed, returning the affected lists.
    async fn expire_due_lists(&self, now: DateTime<Utc>) -> Result<Vec<ShoppingList>, MarketplaceError>;

    /// Records a review and, in the same transaction, recomputes the reviewee's average rating from scratch over all
    /// reviews they have received (including the new one) and writes it back to the user record.
    ///
    /// Returns the review and the new average. A duplicate `(reviewer, list)` pair fails with
    /// [`MarketplaceError::ReviewAlreadyExists`].
    async fn record_review(&self, review: NewReview) -> Result<(Review, f64), MarketplaceError>;

    /// External payment worker handoff: advances a transaction along
    /// `pending -> processing -> completed/failed` (and `completed -> refunded/disputed`). Illegal moves fail with
    /// [`MarketplaceError::TransitionForbidden`]. `completed` and `failed` stamp `completed_at`.
    async fn update_transaction_status(
        &self,
        transaction_id: i64,
        to: TransactionStatus,
        now: DateTime<Utc>,
    ) -> Result<Transaction, MarketplaceError>;

    /// Creates the pending payout for a completed transaction, over the transaction's `shopper_payout` amount.
    /// One payout per transaction.
    async fn create_payout(&self, transaction_id: i64) -> Result<Payout, MarketplaceError>;

    /// Advances a payout along `pending -> processing -> completed/failed`, driven by the external payment rail.
    async fn update_payout_status(
        &self,
        payout_id: i64,
        to: PayoutStatus,
        now: DateTime<Utc>,
    ) -> Result<Payout, MarketplaceError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), MarketplaceError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Shopper {shopper_id} has already bid on list {list_id}")]
    BidAlreadyExists { shopper_id: i64, list_id: i64 },
    #[error("Reviewer {reviewer_id} has already reviewed list {list_id}")]
    ReviewAlreadyExists { reviewer_id: i64, list_id: i64 },
    #[error("A user with email '{0}' already exists")]
    UserAlreadyExists(String),
    #[error("A payout already exists for transaction {0}")]
    PayoutAlreadyExists(i64),
    #[error("The list does not allow this operation in its current state: {status}")]
    InvalidListState { status: ListStatus },
    #[error("The bid is not active (current status: {status})")]
    BidNotActive { status: BidStatus },
    #[error("{entity} status cannot change from {from} to {to}")]
    TransitionForbidden { entity: &'static str, from: String, to: String },
    #[error("A payout requires a completed transaction (current status: {0})")]
    TransactionNotCompleted(TransactionStatus),
    #[error("The requested list {0} does not exist")]
    ListNotFound(i64),
    #[error("The requested bid {0} does not exist on this list")]
    BidNotFound(i64),
    #[error("The requested transaction {0} does not exist")]
    TransactionNotFound(i64),
    #[error("The requested payout {0} does not exist")]
    PayoutNotFound(i64),
    #[error("The requested user {0} does not exist")]
    UserNotFound(i64),
    #[error("The award could not be serialized after retrying: {0}")]
    Concurrency(String),
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self {
        MarketplaceError::DatabaseError(e.to_string())
    }
}
