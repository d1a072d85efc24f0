use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{ListStatus, NewShoppingList, ShoppingList},
    market_objects::ListQueryFilter,
    traits::MarketplaceError,
};

pub async fn insert_list(
    list: NewShoppingList,
    conn: &mut SqliteConnection,
) -> Result<ShoppingList, MarketplaceError> {
    let items = list.items.to_string();
    let result = sqlx::query_as(
        r#"
            INSERT INTO shopping_lists (
                client_id, title, description, store_name, store_city, items,
                estimated_total, max_budget, platform_fee_percentage,
                preferred_delivery_time, bidding_deadline, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(list.client_id)
    .bind(list.title)
    .bind(list.description)
    .bind(list.store_name)
    .bind(list.store_city)
    .bind(items)
    .bind(list.estimated_total)
    .bind(list.max_budget)
    .bind(list.platform_fee_percentage)
    .bind(list.preferred_delivery_time)
    .bind(list.bidding_deadline)
    .bind(list.expires_at)
    .fetch_one(conn)
    .await?;
    Ok(result)
}

pub async fn fetch_list(list_id: i64, conn: &mut SqliteConnection) -> Result<Option<ShoppingList>, MarketplaceError> {
    let list = sqlx::query_as(r#"SELECT * FROM shopping_lists WHERE id = ?"#)
        .bind(list_id)
        .fetch_optional(conn)
        .await?;
    Ok(list)
}

/// Fetches lists according to criteria specified in the `ListQueryFilter`.
///
/// Resulting lists are ordered by `created_at` in descending order (newest first).
pub async fn search_lists(
    query: ListQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<ShoppingList>, MarketplaceError> {
    let mut builder = QueryBuilder::new(r#"SELECT * FROM shopping_lists "#);
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(client_id) = query.client_id {
        where_clause.push("client_id = ");
        where_clause.push_bind_unseparated(client_id);
    }
    if let Some(shopper_id) = query.selected_shopper {
        where_clause.push("selected_shopper = ");
        where_clause.push_bind_unseparated(shopper_id);
    }
    if let Some(city) = query.store_city {
        where_clause.push("store_city = ");
        where_clause.push_bind_unseparated(city);
    }
    if !query.statuses.is_empty() {
        let statuses = query.statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let lists = builder.build_query_as::<ShoppingList>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_lists: {} rows", lists.len());
    Ok(lists)
}

pub async fn set_status(
    list_id: i64,
    status: ListStatus,
    conn: &mut SqliteConnection,
) -> Result<ShoppingList, MarketplaceError> {
    let list = sqlx::query_as(
        "UPDATE shopping_lists SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(status)
    .bind(list_id)
    .fetch_optional(conn)
    .await?
    .ok_or(MarketplaceError::ListNotFound(list_id))?;
    Ok(list)
}

/// Marks the list assigned to the given shopper. Only the award flow calls this.
pub async fn assign_shopper(
    list_id: i64,
    shopper_id: i64,
    conn: &mut SqliteConnection,
) -> Result<ShoppingList, MarketplaceError> {
    let list = sqlx::query_as(
        r#"
            UPDATE shopping_lists
            SET status = 'assigned', selected_shopper = $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
            RETURNING *;
        "#,
    )
    .bind(shopper_id)
    .bind(list_id)
    .fetch_optional(conn)
    .await?
    .ok_or(MarketplaceError::ListNotFound(list_id))?;
    Ok(list)
}

/// Applies any deadline or expiry transition the list is due for, returning the up-to-date record.
///
/// The checks run lazily inside whichever flow observed the list, in that flow's transaction, so the engine never
/// depends on a background sweep for correctness. Expiry only applies while no award has occurred.
pub async fn apply_due_transitions(
    list: ShoppingList,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<ShoppingList, MarketplaceError> {
    if list.status.is_awardable() && now >= list.expires_at {
        debug!("🗃️ List {} passed its expiry time unawarded; expiring", list.id);
        return set_status(list.id, ListStatus::Expired, conn).await;
    }
    if list.status == ListStatus::Open && now >= list.bidding_deadline {
        debug!("🗃️ Bidding deadline for list {} has passed; closing bidding", list.id);
        return set_status(list.id, ListStatus::BiddingClosed, conn).await;
    }
    Ok(list)
}

/// Bulk form of the deadline transition, for the scheduler hook.
pub async fn close_due_bidding(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<ShoppingList>, MarketplaceError> {
    let closed = sqlx::query_as(
        r#"
            UPDATE shopping_lists
            SET status = 'bidding_closed', updated_at = CURRENT_TIMESTAMP
            WHERE status = 'open' AND bidding_deadline <= $1
            RETURNING *;
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(closed)
}

/// Bulk form of the expiry transition, for the scheduler hook.
pub async fn expire_due(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<ShoppingList>, MarketplaceError> {
    let expired = sqlx::query_as(
        r#"
            UPDATE shopping_lists
            SET status = 'expired', updated_at = CURRENT_TIMESTAMP
            WHERE status IN ('open', 'bidding_closed') AND expires_at <= $1
            RETURNING *;
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(expired)
}
