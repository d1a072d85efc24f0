//! `SqliteDatabase` is a concrete implementation of a Shopr engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Each workflow runs as one sqlx transaction over the low-level functions in [`super::db`]; the award flow
//! additionally takes the write lock up front so concurrent awards on the same list serialize.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use log::*;
use shopr_common::{calculate_fees, Money};
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{bids, db_url, lists, new_pool, reviews, transactions, users};
use crate::{
    db_types::{
        Bid,
        BidHistory,
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
    market_objects::{BidListing, ListQueryFilter},
    traits::{AwardOutcome, ListingManagement, MarketplaceDatabase, MarketplaceError},
};

/// How many times the award flow retries on lock contention before giving up.
const MAX_AWARD_ATTEMPTS: u32 = 3;
const AWARD_RETRY_DELAY_MS: u64 = 25;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database instance using the URL from the `SHOPR_DATABASE_URL` environment variable.
    pub async fn new(max_connections: u32) -> Result<Self, MarketplaceError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, MarketplaceError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// A lazy, restartable stream over a list's active bids, cheapest first. Each call re-queries, so the stream
    /// always reflects the ledger's current state rather than a snapshot.
    pub fn stream_active_bids(&self, list_id: i64) -> BoxStream<'_, Result<Bid, sqlx::Error>> {
        bids::stream_active_bids(list_id, &self.pool)
    }
}

/// Whether the error is SQLite lock contention (SQLITE_BUSY and friends), worth retrying.
fn is_lock_contention(e: &MarketplaceError) -> bool {
    match e {
        MarketplaceError::DatabaseError(msg) => msg.contains("database is locked") || msg.contains("database table is locked"),
        _ => false,
    }
}

/// The four award steps of the workflow, run inside the caller's already-open exclusive transaction.
async fn award_steps(
    list_id: i64,
    bid_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<AwardOutcome, MarketplaceError> {
    let list = lists::fetch_list(list_id, conn).await?.ok_or(MarketplaceError::ListNotFound(list_id))?;
    let list = lists::apply_due_transitions(list, now, conn).await?;
    if !list.status.is_awardable() {
        return Err(MarketplaceError::InvalidListState { status: list.status });
    }
    let bid = bids::fetch_bid(bid_id, conn).await?.ok_or(MarketplaceError::BidNotFound(bid_id))?;
    // a bid that belongs to another list, or is no longer active, is not a candidate on this list
    if bid.shopping_list_id != list.id || !bid.is_active() {
        return Err(MarketplaceError::BidNotFound(bid_id));
    }
    let bid = bids::set_status(bid.id, BidStatus::Won, conn).await?;
    let losers = bids::mark_siblings_lost(list.id, bid.id, conn).await?;
    let list = lists::assign_shopper(list.id, bid.shopper_id, conn).await?;
    let split = calculate_fees(bid.amount, list.platform_fee_percentage);
    let transaction = transactions::insert_transaction(list.id, bid.id, bid.amount, split, conn).await?;
    debug!(
        "🗃️ Bid {} won list {} for {} ({} lost); fee {} / payout {}",
        bid.id, list.id, bid.amount, losers, split.platform_fee, split.shopper_payout
    );
    Ok(AwardOutcome { list, winning_bid: bid, transaction })
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        users::insert_user(user, &mut conn).await
    }

    async fn insert_list(&self, list: NewShoppingList) -> Result<ShoppingList, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let list = lists::insert_list(list, &mut conn).await?;
        debug!("🗃️ List {} created for client {} (bidding until {})", list.id, list.client_id, list.bidding_deadline);
        Ok(list)
    }

    async fn cancel_list(&self, list_id: i64, now: DateTime<Utc>) -> Result<ShoppingList, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let list = lists::fetch_list(list_id, &mut tx).await?.ok_or(MarketplaceError::ListNotFound(list_id))?;
        let list = lists::apply_due_transitions(list, now, &mut tx).await?;
        if list.status != ListStatus::Open {
            // cancellation after assignment needs a refund workflow, which lives outside this engine
            return Err(MarketplaceError::InvalidListState { status: list.status });
        }
        let list = lists::set_status(list.id, ListStatus::Cancelled, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ List {list_id} cancelled by client");
        Ok(list)
    }

    async fn advance_fulfilment(&self, list_id: i64, to: ListStatus) -> Result<ShoppingList, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let list = lists::fetch_list(list_id, &mut tx).await?.ok_or(MarketplaceError::ListNotFound(list_id))?;
        let legal = matches!(
            (list.status, to),
            (ListStatus::Assigned, ListStatus::InProgress) | (ListStatus::InProgress, ListStatus::Delivered)
        );
        if !legal {
            return Err(MarketplaceError::TransitionForbidden {
                entity: "shopping list",
                from: list.status.to_string(),
                to: to.to_string(),
            });
        }
        let list = lists::set_status(list.id, to, &mut tx).await?;
        tx.commit().await?;
        Ok(list)
    }

    async fn place_bid(&self, bid: NewBid, now: DateTime<Utc>) -> Result<Bid, MarketplaceError> {
        if !bid.amount.is_positive() {
            return Err(MarketplaceError::Validation(format!("Bid amount must be positive, got {}", bid.amount)));
        }
        let mut tx = self.pool.begin().await?;
        let list = lists::fetch_list(bid.shopping_list_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::ListNotFound(bid.shopping_list_id))?;
        let list = lists::apply_due_transitions(list, now, &mut tx).await?;
        // the deadline check is part of the lazy transition: at or after the deadline the list is no longer `open`
        if list.status != ListStatus::Open {
            return Err(MarketplaceError::InvalidListState { status: list.status });
        }
        let bid = bids::insert_bid(bid, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Shopper {} bid {} on list {}", bid.shopper_id, bid.amount, bid.shopping_list_id);
        Ok(bid)
    }

    async fn amend_bid(
        &self,
        bid_id: i64,
        new_amount: Money,
        changed_by: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Bid, MarketplaceError> {
        if !new_amount.is_positive() {
            return Err(MarketplaceError::Validation(format!("Bid amount must be positive, got {new_amount}")));
        }
        let mut tx = self.pool.begin().await?;
        let bid = bids::fetch_bid(bid_id, &mut tx).await?.ok_or(MarketplaceError::BidNotFound(bid_id))?;
        if !bid.is_active() {
            return Err(MarketplaceError::BidNotActive { status: bid.status });
        }
        let list = lists::fetch_list(bid.shopping_list_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::ListNotFound(bid.shopping_list_id))?;
        let list = lists::apply_due_transitions(list, now, &mut tx).await?;
        if list.status != ListStatus::Open {
            return Err(MarketplaceError::InvalidListState { status: list.status });
        }
        bids::insert_history(bid.id, bid.amount, new_amount, changed_by, &mut tx).await?;
        let bid = bids::update_amount(bid.id, new_amount, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Bid {bid_id} amended to {new_amount}");
        Ok(bid)
    }

    async fn withdraw_bid(&self, bid_id: i64) -> Result<Bid, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let bid = bids::fetch_bid(bid_id, &mut tx).await?.ok_or(MarketplaceError::BidNotFound(bid_id))?;
        if !bid.is_active() {
            return Err(MarketplaceError::BidNotActive { status: bid.status });
        }
        let bid = bids::set_status(bid.id, BidStatus::Withdrawn, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Bid {bid_id} withdrawn");
        Ok(bid)
    }

    async fn award_bid(&self, list_id: i64, bid_id: i64, now: DateTime<Utc>) -> Result<AwardOutcome, MarketplaceError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut conn = self.pool.acquire().await?;
            // take the write lock up front: the read-check-write sequence below must not interleave with a
            // concurrent award on the same store
            sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
            let result = award_steps(list_id, bid_id, now, &mut conn).await;
            let result = match result {
                Ok(outcome) => {
                    sqlx::query("COMMIT").execute(&mut *conn).await?;
                    Ok(outcome)
                },
                Err(e) => {
                    let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                    Err(e)
                },
            };
            match result {
                Err(e) if is_lock_contention(&e) => {
                    if attempt >= MAX_AWARD_ATTEMPTS {
                        error!("🗃️ Award of bid {bid_id} on list {list_id} gave up after {attempt} attempts: {e}");
                        return Err(MarketplaceError::Concurrency(e.to_string()));
                    }
                    warn!("🗃️ Award of bid {bid_id} on list {list_id} hit lock contention (attempt {attempt}); retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(AWARD_RETRY_DELAY_MS)).await;
                },
                other => return other,
            }
        }
    }

    async fn close_due_bidding(&self, now: DateTime<Utc>) -> Result<Vec<ShoppingList>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let closed = lists::close_due_bidding(now, &mut conn).await?;
        if !closed.is_empty() {
            debug!("🗃️ Closed bidding on {} lists past their deadline", closed.len());
        }
        Ok(closed)
    }

    async fn expire_due_lists(&self, now: DateTime<Utc>) -> Result<Vec<ShoppingList>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let expired = lists::expire_due(now, &mut conn).await?;
        if !expired.is_empty() {
            debug!("🗃️ Expired {} unawarded lists", expired.len());
        }
        Ok(expired)
    }

    async fn record_review(&self, review: NewReview) -> Result<(Review, f64), MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        lists::fetch_list(review.shopping_list_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::ListNotFound(review.shopping_list_id))?;
        users::fetch_user(review.reviewer_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::UserNotFound(review.reviewer_id))?;
        let reviewee = users::fetch_user(review.reviewee_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::UserNotFound(review.reviewee_id))?;
        let review = reviews::insert_review(review, &mut tx).await?;
        let average = reviews::average_rating_for(reviewee.id, &mut tx).await?;
        users::update_average_rating(reviewee.id, average, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Review {} recorded; user {} now averages {average:.2}", review.id, reviewee.id);
        Ok((review, average))
    }

    async fn update_transaction_status(
        &self,
        transaction_id: i64,
        to: TransactionStatus,
        now: DateTime<Utc>,
    ) -> Result<Transaction, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let transaction = transactions::fetch_transaction(transaction_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::TransactionNotFound(transaction_id))?;
        if !transaction.status.can_transition_to(to) {
            return Err(MarketplaceError::TransitionForbidden {
                entity: "transaction",
                from: transaction.status.to_string(),
                to: to.to_string(),
            });
        }
        let completed_at =
            matches!(to, TransactionStatus::Completed | TransactionStatus::Failed).then_some(now);
        let transaction = transactions::update_status(transaction_id, to, completed_at, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Transaction {transaction_id} is now {to}");
        Ok(transaction)
    }

    async fn create_payout(&self, transaction_id: i64) -> Result<Payout, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let transaction = transactions::fetch_transaction(transaction_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::TransactionNotFound(transaction_id))?;
        if transaction.status != TransactionStatus::Completed {
            return Err(MarketplaceError::TransactionNotCompleted(transaction.status));
        }
        let bid = bids::fetch_bid(transaction.bid_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::BidNotFound(transaction.bid_id))?;
        let payout = transactions::insert_payout(bid.shopper_id, transaction.id, transaction.shopper_payout, &mut tx)
            .await?;
        tx.commit().await?;
        debug!("🗃️ Payout {} of {} created for shopper {}", payout.id, payout.amount, payout.shopper_id);
        Ok(payout)
    }

    async fn update_payout_status(
        &self,
        payout_id: i64,
        to: PayoutStatus,
        now: DateTime<Utc>,
    ) -> Result<Payout, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let payout =
            transactions::fetch_payout(payout_id, &mut tx).await?.ok_or(MarketplaceError::PayoutNotFound(payout_id))?;
        if !payout.status.can_transition_to(to) {
            return Err(MarketplaceError::TransitionForbidden {
                entity: "payout",
                from: payout.status.to_string(),
                to: to.to_string(),
            });
        }
        let completed_at = matches!(to, PayoutStatus::Completed | PayoutStatus::Failed).then_some(now);
        let payout = transactions::update_payout_status(payout_id, to, completed_at, &mut tx).await?;
        tx.commit().await?;
        Ok(payout)
    }

    async fn close(&mut self) -> Result<(), MarketplaceError> {
        self.pool.close().await;
        Ok(())
    }
}

impl ListingManagement for SqliteDatabase {
    async fn fetch_list(&self, list_id: i64) -> Result<Option<ShoppingList>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        lists::fetch_list(list_id, &mut conn).await
    }

    async fn search_lists(&self, query: ListQueryFilter) -> Result<Vec<ShoppingList>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        lists::search_lists(query, &mut conn).await
    }

    async fn fetch_bid(&self, bid_id: i64) -> Result<Option<Bid>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        bids::fetch_bid(bid_id, &mut conn).await
    }

    async fn active_bids(&self, list_id: i64) -> Result<Vec<BidListing>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        bids::active_bids_with_shopper(list_id, &mut conn).await
    }

    async fn lowest_active_bid(&self, list_id: i64) -> Result<Option<Bid>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        bids::lowest_active_bid(list_id, &mut conn).await
    }

    async fn bid_history(&self, bid_id: i64) -> Result<Vec<BidHistory>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        bids::history_for_bid(bid_id, &mut conn).await
    }

    async fn fetch_transaction(&self, transaction_id: i64) -> Result<Option<Transaction>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_transaction(transaction_id, &mut conn).await
    }

    async fn fetch_transaction_for_list(&self, list_id: i64) -> Result<Option<Transaction>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_for_list(list_id, &mut conn).await
    }

    async fn fetch_payout_for_transaction(&self, transaction_id: i64) -> Result<Option<Payout>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_payout_for_transaction(transaction_id, &mut conn).await
    }

    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user(user_id, &mut conn).await
    }

    async fn reviews_for(&self, reviewee_id: i64) -> Result<Vec<Review>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        reviews::reviews_for(reviewee_id, &mut conn).await
    }

    async fn average_rating(&self, user_id: i64) -> Result<f64, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user(user_id, &mut conn).await?.ok_or(MarketplaceError::UserNotFound(user_id))?;
        Ok(user.average_rating)
    }
}
