//! List lifecycle: creation validation, cancellation, fulfilment progression and the sweep hooks.
use chrono::{Duration, Utc};
use shopr_common::Money;
use shopr_engine::{
    db_types::{ListStatus, NewShoppingList},
    test_utils::{
        fixtures::{seed_list_with_deadline, seed_open_list, seed_user},
        prepare_env::{prepare_test_env, random_db_path},
    },
    ListApi,
    ListQueryFilter,
    ListingManagement,
    MarketplaceDatabase,
    MarketplaceError,
    SqliteDatabase,
};

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

#[tokio::test]
async fn list_creation_validates_its_time_ordering_and_amounts() {
    let db = new_db().await;
    let client = seed_user(&db, "client@example.com").await;
    let api = ListApi::new(db.clone());

    let now = Utc::now();
    let deadline = now + Duration::hours(2);
    let good = NewShoppingList::new(
        client.id,
        "Friday shop",
        Money::from_whole(45),
        deadline,
        deadline + Duration::hours(3),
        deadline + Duration::days(1),
    );

    let list = api.create_list(good.clone()).await.expect("Error creating list");
    assert_eq!(list.status, ListStatus::Open);
    assert!(list.selected_shopper.is_none());

    // deadline in the past
    let mut bad = good.clone();
    bad.bidding_deadline = now - Duration::minutes(1);
    let err = api.create_list(bad).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Validation(_)), "got {err}");

    // delivery before bidding closes
    let mut bad = good.clone();
    bad.preferred_delivery_time = deadline - Duration::minutes(30);
    let err = api.create_list(bad).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Validation(_)), "got {err}");

    // expiry before the deadline
    let mut bad = good.clone();
    bad.expires_at = deadline - Duration::minutes(30);
    let err = api.create_list(bad).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Validation(_)), "got {err}");

    // nothing to buy
    let mut bad = good.clone();
    bad.estimated_total = Money::from_cents(0);
    let err = api.create_list(bad).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Validation(_)), "got {err}");

    let mut bad = good;
    bad.title = "   ".to_string();
    let err = api.create_list(bad).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Validation(_)), "got {err}");
}

#[tokio::test]
async fn an_open_list_can_be_cancelled_exactly_once() {
    let db = new_db().await;
    let client = seed_user(&db, "client@example.com").await;
    let list = seed_open_list(&db, client.id, 30).await;
    let api = ListApi::new(db.clone());

    let list = api.cancel_list(list.id).await.expect("Error cancelling list");
    assert_eq!(list.status, ListStatus::Cancelled);

    let err = api.cancel_list(list.id).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::InvalidListState { status: ListStatus::Cancelled }), "got {err}");

    let err = api.cancel_list(9_999).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::ListNotFound(9_999)), "got {err}");
}

#[tokio::test]
async fn cancellation_respects_the_lazy_transitions() {
    let db = new_db().await;
    let client = seed_user(&db, "client@example.com").await;
    let list = seed_open_list(&db, client.id, 10).await;

    // by the time the client clicks cancel, the list has already expired
    let err = db.cancel_list(list.id, list.expires_at + Duration::seconds(1)).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::InvalidListState { status: ListStatus::Expired }), "got {err}");
    let list = db.fetch_list(list.id).await.expect("Error fetching list").unwrap();
    assert_eq!(list.status, ListStatus::Expired);
}

#[tokio::test]
async fn fulfilment_only_moves_forward() {
    let db = new_db().await;
    let client = seed_user(&db, "client@example.com").await;
    let list = seed_open_list(&db, client.id, 30).await;
    let api = ListApi::new(db.clone());

    // not assigned yet
    let err = api.advance_fulfilment(list.id, ListStatus::InProgress).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::TransitionForbidden { .. }), "got {err}");

    // a direct open -> delivered jump is equally illegal
    let err = api.advance_fulfilment(list.id, ListStatus::Delivered).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::TransitionForbidden { .. }), "got {err}");
}

#[tokio::test]
async fn the_sweep_hooks_close_and_expire_due_lists() {
    let db = new_db().await;
    let client = seed_user(&db, "client@example.com").await;
    let api = ListApi::new(db.clone());

    let soon = Utc::now() + Duration::minutes(1);
    let later = Utc::now() + Duration::hours(6);
    let due = seed_list_with_deadline(&db, client.id, soon).await;
    let not_due = seed_list_with_deadline(&db, client.id, later).await;

    // just past the first deadline: one list closes, nothing expires
    let result = api.run_sweep(soon + Duration::seconds(1)).await.expect("Error running sweep");
    assert_eq!(result.closed_count(), 1);
    assert_eq!(result.closed[0].id, due.id);
    assert_eq!(result.expired_count(), 0);

    let not_due = db.fetch_list(not_due.id).await.expect("Error fetching list").unwrap();
    assert_eq!(not_due.status, ListStatus::Open);

    // two days on, both lists have passed their expiry unawarded
    let result = api.run_sweep(Utc::now() + Duration::days(2)).await.expect("Error running sweep");
    assert_eq!(result.closed_count(), 0);
    assert_eq!(result.expired_count(), 2);
    for list in &result.expired {
        assert_eq!(list.status, ListStatus::Expired);
    }

    // sweeping again finds nothing left to do
    let result = api.run_sweep(Utc::now() + Duration::days(3)).await.expect("Error running sweep");
    assert_eq!(result.total_count(), 0);
}

#[tokio::test]
async fn list_searches_filter_by_client_and_status() {
    let db = new_db().await;
    let client = seed_user(&db, "client@example.com").await;
    let other = seed_user(&db, "other@example.com").await;
    let api = ListApi::new(db.clone());

    let mine = seed_open_list(&db, client.id, 30).await;
    seed_open_list(&db, other.id, 30).await;
    let cancelled = seed_open_list(&db, client.id, 30).await;
    api.cancel_list(cancelled.id).await.expect("Error cancelling list");

    let open_mine = api
        .search_lists(ListQueryFilter::default().with_client_id(client.id).with_status(ListStatus::Open))
        .await
        .expect("Error searching lists");
    assert_eq!(open_mine.len(), 1);
    assert_eq!(open_mine[0].id, mine.id);

    let all_mine = api
        .search_lists(ListQueryFilter::default().with_client_id(client.id))
        .await
        .expect("Error searching lists");
    assert_eq!(all_mine.len(), 2);
}
