//! Concurrency: however many award attempts race on a list, exactly one wins.
use chrono::Utc;
use shopr_common::Money;
use shopr_engine::{
    db_types::{BidStatus, ListStatus, NewBid},
    test_utils::{
        fixtures::{seed_open_list, seed_user},
        prepare_env::{prepare_test_env, random_db_path},
    },
    ListingManagement,
    MarketplaceDatabase,
    MarketplaceError,
    SqliteDatabase,
};

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 8).await.expect("Error creating database")
}

#[tokio::test]
async fn two_simultaneous_awards_produce_exactly_one_winner() {
    let db = new_db().await;
    let client = seed_user(&db, "client@example.com").await;
    let s1 = seed_user(&db, "s1@example.com").await;
    let s2 = seed_user(&db, "s2@example.com").await;
    let list = seed_open_list(&db, client.id, 30).await;

    let bid1 = db.place_bid(NewBid::new(s1.id, list.id, Money::from_whole(50)), Utc::now()).await.expect("Error placing bid");
    let bid2 = db.place_bid(NewBid::new(s2.id, list.id, Money::from_whole(55)), Utc::now()).await.expect("Error placing bid");

    // the double-click scenario: the client fires two accepts for different bids at the same moment
    let (d1, d2) = (db.clone(), db.clone());
    let t1 = tokio::spawn(async move { d1.award_bid(list.id, bid1.id, Utc::now()).await });
    let t2 = tokio::spawn(async move { d2.award_bid(list.id, bid2.id, Utc::now()).await });
    let results = [t1.await.expect("task panicked"), t2.await.expect("task panicked")];

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one of two racing awards must commit");
    let failure = results.iter().find(|r| r.is_err()).unwrap().as_ref().unwrap_err();
    assert!(
        matches!(
            failure,
            MarketplaceError::InvalidListState { status: ListStatus::Assigned } | MarketplaceError::Concurrency(_)
        ),
        "got {failure}"
    );

    // the committed state is internally consistent: one won bid, and the assignment agrees with it
    let outcome = results.iter().find_map(|r| r.as_ref().ok()).unwrap();
    let list = db.fetch_list(list.id).await.expect("Error fetching list").unwrap();
    assert_eq!(list.status, ListStatus::Assigned);
    assert_eq!(list.selected_shopper, Some(outcome.winning_bid.shopper_id));

    let mut won = 0;
    for bid_id in [bid1.id, bid2.id] {
        let bid = db.fetch_bid(bid_id).await.expect("Error fetching bid").unwrap();
        match bid.status {
            BidStatus::Won => won += 1,
            BidStatus::Lost => {},
            other => panic!("bid {bid_id} ended in unexpected state {other}"),
        }
    }
    assert_eq!(won, 1);

    let tx = db.fetch_transaction_for_list(list.id).await.expect("Error fetching transaction").unwrap();
    assert_eq!(tx.bid_id, outcome.winning_bid.id);
}

#[tokio::test]
async fn a_burst_of_racing_awards_still_yields_one_winner() {
    const SHOPPERS: usize = 4;
    const ATTEMPTS_PER_BID: usize = 2;

    let db = new_db().await;
    let client = seed_user(&db, "client@example.com").await;
    let list = seed_open_list(&db, client.id, 30).await;

    let mut bid_ids = Vec::with_capacity(SHOPPERS);
    for i in 0..SHOPPERS {
        let shopper = seed_user(&db, &format!("shopper{i}@example.com")).await;
        #[allow(clippy::cast_possible_wrap)]
        let amount = Money::from_whole(40 + i as i64);
        let bid = db.place_bid(NewBid::new(shopper.id, list.id, amount), Utc::now()).await.expect("Error placing bid");
        bid_ids.push(bid.id);
    }

    let mut tasks = Vec::new();
    for &bid_id in &bid_ids {
        for _ in 0..ATTEMPTS_PER_BID {
            let db = db.clone();
            tasks.push(tokio::spawn(async move { db.award_bid(list.id, bid_id, Utc::now()).await }));
        }
    }
    let mut successes = 0;
    for task in tasks {
        if task.await.expect("task panicked").is_ok() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1, "exactly one of {} racing awards must commit", SHOPPERS * ATTEMPTS_PER_BID);

    let mut won = 0;
    for bid_id in bid_ids {
        let bid = db.fetch_bid(bid_id).await.expect("Error fetching bid").unwrap();
        if bid.status == BidStatus::Won {
            won += 1;
        }
    }
    assert_eq!(won, 1, "a list must never end up with two won bids");
}
