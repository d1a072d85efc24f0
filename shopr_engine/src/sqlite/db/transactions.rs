use chrono::{DateTime, Utc};
use shopr_common::{FeeSplit, Money};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Payout, PayoutStatus, Transaction, TransactionStatus},
    traits::MarketplaceError,
};

/// Inserts the pending transaction for a freshly awarded list. The caller supplies the fee split it derived from the
/// winning bid amount; the client is charged exactly that amount.
pub async fn insert_transaction(
    list_id: i64,
    bid_id: i64,
    bid_amount: Money,
    split: FeeSplit,
    conn: &mut SqliteConnection,
) -> Result<Transaction, MarketplaceError> {
    let transaction = sqlx::query_as(
        r#"
            INSERT INTO transactions (shopping_list_id, bid_id, bid_amount, platform_fee, shopper_payout, total_charged)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(list_id)
    .bind(bid_id)
    .bind(bid_amount)
    .bind(split.platform_fee)
    .bind(split.shopper_payout)
    .bind(bid_amount)
    .fetch_one(conn)
    .await?;
    Ok(transaction)
}

pub async fn fetch_transaction(
    transaction_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, MarketplaceError> {
    let transaction =
        sqlx::query_as(r#"SELECT * FROM transactions WHERE id = ?"#).bind(transaction_id).fetch_optional(conn).await?;
    Ok(transaction)
}

pub async fn fetch_for_list(list_id: i64, conn: &mut SqliteConnection) -> Result<Option<Transaction>, MarketplaceError> {
    let transaction = sqlx::query_as(r#"SELECT * FROM transactions WHERE shopping_list_id = ?"#)
        .bind(list_id)
        .fetch_optional(conn)
        .await?;
    Ok(transaction)
}

/// Writes the new status, stamping `completed_at` when the transaction reaches a settled state. Transition legality
/// is the caller's concern.
pub async fn update_status(
    transaction_id: i64,
    status: TransactionStatus,
    completed_at: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<Transaction, MarketplaceError> {
    let transaction = sqlx::query_as(
        "UPDATE transactions SET status = $1, completed_at = COALESCE($2, completed_at) WHERE id = $3 RETURNING *",
    )
    .bind(status)
    .bind(completed_at)
    .bind(transaction_id)
    .fetch_optional(conn)
    .await?
    .ok_or(MarketplaceError::TransactionNotFound(transaction_id))?;
    Ok(transaction)
}

pub async fn insert_payout(
    shopper_id: i64,
    transaction_id: i64,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Payout, MarketplaceError> {
    let payout = sqlx::query_as(
        r#"
            INSERT INTO payouts (shopper_id, transaction_id, amount)
            VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(shopper_id)
    .bind(transaction_id)
    .bind(amount)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            MarketplaceError::PayoutAlreadyExists(transaction_id)
        },
        _ => MarketplaceError::from(e),
    })?;
    Ok(payout)
}

pub async fn fetch_payout(payout_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payout>, MarketplaceError> {
    let payout = sqlx::query_as(r#"SELECT * FROM payouts WHERE id = ?"#).bind(payout_id).fetch_optional(conn).await?;
    Ok(payout)
}

pub async fn fetch_payout_for_transaction(
    transaction_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Payout>, MarketplaceError> {
    let payout = sqlx::query_as(r#"SELECT * FROM payouts WHERE transaction_id = ?"#)
        .bind(transaction_id)
        .fetch_optional(conn)
        .await?;
    Ok(payout)
}

pub async fn update_payout_status(
    payout_id: i64,
    status: PayoutStatus,
    completed_at: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<Payout, MarketplaceError> {
    let payout = sqlx::query_as(
        "UPDATE payouts SET status = $1, completed_at = COALESCE($2, completed_at) WHERE id = $3 RETURNING *",
    )
    .bind(status)
    .bind(completed_at)
    .bind(payout_id)
    .fetch_optional(conn)
    .await?
    .ok_or(MarketplaceError::PayoutNotFound(payout_id))?;
    Ok(payout)
}
