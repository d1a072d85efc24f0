use futures_util::stream::BoxStream;
use shopr_common::Money;
use sqlx::{Sqlite, SqliteConnection};

use crate::{
    db_types::{Bid, BidHistory, BidStatus, NewBid},
    market_objects::BidListing,
    traits::MarketplaceError,
};

/// Active bids ascending by amount; the earliest bid wins ties so the first shopper to offer a price keeps the
/// advantage, and the trailing `id` makes the order total even within one timestamp second.
const ACTIVE_BIDS_SQL: &str = r#"
    SELECT * FROM bids
    WHERE shopping_list_id = ? AND status = 'active'
    ORDER BY amount ASC, created_at ASC, id ASC
"#;

pub async fn insert_bid(bid: NewBid, conn: &mut SqliteConnection) -> Result<Bid, MarketplaceError> {
    let NewBid { shopper_id, shopping_list_id, amount, message, estimated_minutes, distance_to_store } = bid;
    let bid = sqlx::query_as(
        r#"
            INSERT INTO bids (shopper_id, shopping_list_id, amount, message, estimated_minutes, distance_to_store)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(shopper_id)
    .bind(shopping_list_id)
    .bind(amount)
    .bind(message)
    .bind(estimated_minutes)
    .bind(distance_to_store)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            MarketplaceError::BidAlreadyExists { shopper_id, list_id: shopping_list_id }
        },
        _ => MarketplaceError::from(e),
    })?;
    Ok(bid)
}

pub async fn fetch_bid(bid_id: i64, conn: &mut SqliteConnection) -> Result<Option<Bid>, MarketplaceError> {
    let bid = sqlx::query_as(r#"SELECT * FROM bids WHERE id = ?"#).bind(bid_id).fetch_optional(conn).await?;
    Ok(bid)
}

pub async fn set_status(
    bid_id: i64,
    status: BidStatus,
    conn: &mut SqliteConnection,
) -> Result<Bid, MarketplaceError> {
    let bid = sqlx::query_as("UPDATE bids SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
        .bind(status)
        .bind(bid_id)
        .fetch_optional(conn)
        .await?
        .ok_or(MarketplaceError::BidNotFound(bid_id))?;
    Ok(bid)
}

pub async fn update_amount(
    bid_id: i64,
    new_amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Bid, MarketplaceError> {
    let bid = sqlx::query_as("UPDATE bids SET amount = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
        .bind(new_amount)
        .bind(bid_id)
        .fetch_optional(conn)
        .await?
        .ok_or(MarketplaceError::BidNotFound(bid_id))?;
    Ok(bid)
}

/// Marks every other still-active bid on the list as lost. Withdrawn bids are left untouched.
/// Returns the number of bids that lost.
pub async fn mark_siblings_lost(
    list_id: i64,
    winning_bid_id: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, MarketplaceError> {
    let result = sqlx::query(
        r#"
            UPDATE bids SET status = 'lost', updated_at = CURRENT_TIMESTAMP
            WHERE shopping_list_id = $1 AND id <> $2 AND status = 'active'
        "#,
    )
    .bind(list_id)
    .bind(winning_bid_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn insert_history(
    bid_id: i64,
    old_amount: Money,
    new_amount: Money,
    changed_by: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<BidHistory, MarketplaceError> {
    let entry = sqlx::query_as(
        r#"
            INSERT INTO bid_history (bid_id, old_amount, new_amount, changed_by)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(bid_id)
    .bind(old_amount)
    .bind(new_amount)
    .bind(changed_by)
    .fetch_one(conn)
    .await?;
    Ok(entry)
}

pub async fn history_for_bid(bid_id: i64, conn: &mut SqliteConnection) -> Result<Vec<BidHistory>, MarketplaceError> {
    let history = sqlx::query_as("SELECT * FROM bid_history WHERE bid_id = ? ORDER BY changed_at DESC, id DESC")
        .bind(bid_id)
        .fetch_all(conn)
        .await?;
    Ok(history)
}

pub async fn lowest_active_bid(list_id: i64, conn: &mut SqliteConnection) -> Result<Option<Bid>, MarketplaceError> {
    let sql = format!("{ACTIVE_BIDS_SQL} LIMIT 1");
    let bid = sqlx::query_as(&sql).bind(list_id).fetch_optional(conn).await?;
    Ok(bid)
}

/// The active bids on a list joined with each shopper's display name and average rating, for the client choosing
/// among them.
pub async fn active_bids_with_shopper(
    list_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<BidListing>, MarketplaceError> {
    let listings = sqlx::query_as(
        r#"
            SELECT
                b.id, b.shopping_list_id, b.shopper_id, u.display_name AS shopper_name,
                u.average_rating AS shopper_rating, b.amount, b.message, b.estimated_minutes,
                b.distance_to_store, b.created_at
            FROM bids b
            JOIN users u ON u.id = b.shopper_id
            WHERE b.shopping_list_id = ? AND b.status = 'active'
            ORDER BY b.amount ASC, b.created_at ASC, b.id ASC;
        "#,
    )
    .bind(list_id)
    .fetch_all(conn)
    .await?;
    Ok(listings)
}

/// A lazy stream over the active bids, cheapest first. The query runs as the stream is polled; calling again
/// re-queries and reflects the current state of the ledger rather than a snapshot.
pub fn stream_active_bids<'a, E>(list_id: i64, executor: E) -> BoxStream<'a, Result<Bid, sqlx::Error>>
where E: sqlx::Executor<'a, Database = Sqlite> + 'a {
    sqlx::query_as(ACTIVE_BIDS_SQL).bind(list_id).fetch(executor)
}
