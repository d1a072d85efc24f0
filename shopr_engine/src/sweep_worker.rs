//! The optional scheduler collaborator.
//!
//! The lazy read-time transitions keep the engine correct on their own; this worker merely applies them proactively
//! so that lists do not sit in a stale `open` state until somebody looks at them.
use chrono::Utc;
use log::*;
use tokio::task::JoinHandle;

use crate::{
    db_types::ShoppingList,
    events::{BiddingClosedEvent, EventProducers},
    ListApi,
    SqliteDatabase,
};

/// Starts the deadline sweep worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `period`, the worker closes bidding on lists past their deadline (notifying the bidding-closed hook for
/// each) and expires lists past their expiry time without an award.
pub fn start_sweep_worker(db: SqliteDatabase, producers: EventProducers, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let api = ListApi::new(db);
        let mut timer = tokio::time::interval(period);
        info!("🕰️ List deadline sweep worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running list deadline sweep");
            match api.run_sweep(Utc::now()).await {
                Ok(result) => {
                    if result.total_count() > 0 {
                        info!(
                            "🕰️ Sweep complete. {} lists closed for bidding, {} expired",
                            result.closed_count(),
                            result.expired_count()
                        );
                        debug!("🕰️ Closed: {}", list_summary(&result.closed));
                        debug!("🕰️ Expired: {}", list_summary(&result.expired));
                    }
                    for list in result.closed {
                        for emitter in &producers.bidding_closed_producer {
                            emitter.publish_event(BiddingClosedEvent::new(list.clone())).await;
                        }
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running list deadline sweep: {e}");
                },
            }
        }
    })
}

fn list_summary(lists: &[ShoppingList]) -> String {
    lists
        .iter()
        .map(|l| format!("[{}] '{}' client: {}", l.id, l.title, l.client_id))
        .collect::<Vec<String>>()
        .join(", ")
}
