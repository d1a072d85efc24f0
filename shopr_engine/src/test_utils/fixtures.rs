//! Seed helpers shared by the integration tests. These go through the backend trait directly so tests can control
//! the clock and skip the API-level input validation when a scenario calls for it.
use chrono::{DateTime, Duration, Utc};
use shopr_common::Money;

use crate::{
    db_types::{NewShoppingList, NewUser, ShoppingList, User},
    MarketplaceDatabase,
    SqliteDatabase,
};

pub async fn seed_user(db: &SqliteDatabase, email: &str) -> User {
    let name = email.split('@').next().unwrap_or(email);
    db.insert_user(NewUser::new(email).with_display_name(name)).await.expect("Error creating user")
}

/// An open list with its bidding deadline `deadline_mins` minutes from now, delivery two hours after that and expiry
/// a day out.
pub async fn seed_open_list(db: &SqliteDatabase, client_id: i64, deadline_mins: i64) -> ShoppingList {
    let deadline = Utc::now() + Duration::minutes(deadline_mins);
    seed_list_with_deadline(db, client_id, deadline).await
}

pub async fn seed_list_with_deadline(
    db: &SqliteDatabase,
    client_id: i64,
    deadline: DateTime<Utc>,
) -> ShoppingList {
    let list = NewShoppingList::new(
        client_id,
        "Weekly groceries",
        Money::from_whole(60),
        deadline,
        deadline + Duration::hours(2),
        deadline + Duration::days(1),
    )
    .with_store("GreenMart", "Springfield")
    .with_items(serde_json::json!([
        {"name": "Milk", "quantity": 2, "estimated_price": 3.99},
        {"name": "Bread", "quantity": 1, "estimated_price": 2.49},
    ]));
    db.insert_list(list).await.expect("Error creating shopping list")
}
