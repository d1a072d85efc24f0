use serde::{Deserialize, Serialize};

use crate::db_types::{Bid, ShoppingList, Transaction};

/// The result of a successful award: the assigned list, the winning bid and the pending transaction, exactly as
/// committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardOutcome {
    pub list: ShoppingList,
    pub winning_bid: Bid,
    pub transaction: Transaction,
}

/// The lists a sweep pass transitioned, grouped by what happened to them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepResult {
    /// Lists moved from `open` to `bidding_closed` because their deadline passed.
    pub closed: Vec<ShoppingList>,
    /// Lists moved to `expired` because their expiry time passed without an award.
    pub expired: Vec<ShoppingList>,
}

impl SweepResult {
    pub fn closed_count(&self) -> usize {
        self.closed.len()
    }

    pub fn expired_count(&self) -> usize {
        self.expired.len()
    }

    pub fn total_count(&self) -> usize {
        self.closed.len() + self.expired.len()
    }
}
