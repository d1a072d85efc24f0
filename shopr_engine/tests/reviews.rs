//! Review recording and the rating aggregate it maintains.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};
use shopr_common::Money;
use shopr_engine::{
    db_types::{NewBid, NewReview},
    events::{EventHandlers, EventHooks, EventProducers},
    test_utils::{
        fixtures::{seed_open_list, seed_user},
        prepare_env::{prepare_test_env, random_db_path},
    },
    BidFlowApi,
    ListingManagement,
    MarketplaceError,
    ReviewApi,
    SqliteDatabase,
};

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

#[tokio::test]
async fn the_average_rating_is_the_exact_mean_of_all_reviews_received() {
    let db = new_db().await;
    let client = seed_user(&db, "client@example.com").await;
    let shopper = seed_user(&db, "shopper@example.com").await;
    let api = ReviewApi::new(db.clone(), EventProducers::default());

    // one review per list, so each rating needs its own completed job
    for (rating, expected_average) in [(5, 5.0), (3, 4.0), (4, 4.0)] {
        let list = seed_open_list(&db, client.id, 30).await;
        api.record_review(NewReview::new(client.id, shopper.id, list.id, rating)).await.expect("Error recording review");
        let average = api.average_rating(shopper.id).await.expect("Error fetching rating");
        assert_eq!(average, expected_average);
    }

    let reviews = api.reviews_for(shopper.id).await.expect("Error fetching reviews");
    assert_eq!(reviews.len(), 3);
}

#[tokio::test]
async fn one_review_per_reviewer_per_list() {
    let db = new_db().await;
    let client = seed_user(&db, "client@example.com").await;
    let shopper = seed_user(&db, "shopper@example.com").await;
    let list = seed_open_list(&db, client.id, 30).await;
    let api = ReviewApi::new(db.clone(), EventProducers::default());

    api.record_review(NewReview::new(client.id, shopper.id, list.id, 5).with_comment("Fast and accurate"))
        .await
        .expect("Error recording review");
    let err = api.record_review(NewReview::new(client.id, shopper.id, list.id, 1)).await.unwrap_err();
    assert!(
        matches!(err, MarketplaceError::ReviewAlreadyExists { reviewer_id, list_id } if reviewer_id == client.id && list_id == list.id),
        "got {err}"
    );

    // the duplicate must not have moved the aggregate
    assert_eq!(api.average_rating(shopper.id).await.expect("Error fetching rating"), 5.0);

    // the counterpart review in the other direction is its own row
    api.record_review(NewReview::new(shopper.id, client.id, list.id, 4).with_sub_ratings(4, 5, 3))
        .await
        .expect("Error recording review");
    assert_eq!(api.average_rating(client.id).await.expect("Error fetching rating"), 4.0);
}

#[tokio::test]
async fn review_input_validation() {
    let db = new_db().await;
    let client = seed_user(&db, "client@example.com").await;
    let shopper = seed_user(&db, "shopper@example.com").await;
    let list = seed_open_list(&db, client.id, 30).await;
    let api = ReviewApi::new(db.clone(), EventProducers::default());

    for rating in [0, 6, -1] {
        let err = api.record_review(NewReview::new(client.id, shopper.id, list.id, rating)).await.unwrap_err();
        assert!(matches!(err, MarketplaceError::Validation(_)), "rating {rating}: got {err}");
    }
    let err = api
        .record_review(NewReview::new(client.id, shopper.id, list.id, 4).with_sub_ratings(4, 9, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketplaceError::Validation(_)), "got {err}");

    let err = api.record_review(NewReview::new(client.id, shopper.id, 9_999, 4)).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::ListNotFound(9_999)), "got {err}");
    let err = api.record_review(NewReview::new(client.id, 9_999, list.id, 4)).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::UserNotFound(9_999)), "got {err}");
}

#[tokio::test]
async fn bid_listings_show_the_maintained_rating() {
    let db = new_db().await;
    let client = seed_user(&db, "client@example.com").await;
    let shopper = seed_user(&db, "shopper@example.com").await;
    let reviews = ReviewApi::new(db.clone(), EventProducers::default());
    let bids = BidFlowApi::new(db.clone(), EventProducers::default());

    let done = seed_open_list(&db, client.id, 30).await;
    reviews.record_review(NewReview::new(client.id, shopper.id, done.id, 4)).await.expect("Error recording review");

    let open = seed_open_list(&db, client.id, 30).await;
    bids.place_bid(NewBid::new(shopper.id, open.id, Money::from_whole(35))).await.expect("Error placing bid");
    let listings = bids.active_bids(open.id).await.expect("Error listing bids");
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].shopper_rating, 4.0);
}

#[tokio::test]
async fn the_review_recorded_hook_carries_the_new_average() {
    let db = new_db().await;
    let client = seed_user(&db, "client@example.com").await;
    let shopper = seed_user(&db, "shopper@example.com").await;
    let list = seed_open_list(&db, client.id, 30).await;

    let fired = Arc::new(AtomicU32::new(0));
    let counter = fired.clone();
    let mut hooks = EventHooks::default();
    hooks.on_review_recorded(move |event| {
        let counter = counter.clone();
        Box::pin(async move {
            assert_eq!(event.new_average, 5.0);
            counter.fetch_add(1, Ordering::SeqCst);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let api = ReviewApi::new(db.clone(), producers);
    api.record_review(NewReview::new(client.id, shopper.id, list.id, 5)).await.expect("Error recording review");

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(db.average_rating(shopper.id).await.expect("Error fetching rating"), 5.0);
}
