use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{ListStatus, NewShoppingList, NewUser, ShoppingList, User},
    market_objects::ListQueryFilter,
    traits::{MarketplaceDatabase, MarketplaceError, SweepResult},
};

/// `ListApi` fronts the shopping-list lifecycle: creation, client cancellation, the fulfilment progression and the
/// scheduler-facing sweep.
pub struct ListApi<B> {
    db: B,
}

impl<B> Debug for ListApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ListApi")
    }
}

impl<B> ListApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ListApi<B>
where B: MarketplaceDatabase
{
    /// Creates a new shopping list, open for bids.
    ///
    /// Rejects malformed input before anything touches the store: the bidding deadline must lie strictly in the
    /// future, delivery must be expected after bidding closes, and the monetary fields must be positive.
    pub async fn create_list(&self, list: NewShoppingList) -> Result<ShoppingList, MarketplaceError> {
        let now = Utc::now();
        validate_new_list(&list, now)?;
        let list = self.db.insert_list(list).await?;
        debug!("🛒️ List {} ({}) is open for bids until {}", list.id, list.title, list.bidding_deadline);
        Ok(list)
    }

    /// Client-initiated cancellation; legal only while the list is still open.
    pub async fn cancel_list(&self, list_id: i64) -> Result<ShoppingList, MarketplaceError> {
        self.db.cancel_list(list_id, Utc::now()).await
    }

    /// The thin post-award progression: `assigned -> in_progress -> delivered`.
    pub async fn advance_fulfilment(&self, list_id: i64, to: ListStatus) -> Result<ShoppingList, MarketplaceError> {
        self.db.advance_fulfilment(list_id, to).await
    }

    pub async fn fetch_list(&self, list_id: i64) -> Result<Option<ShoppingList>, MarketplaceError> {
        self.db.fetch_list(list_id).await
    }

    pub async fn search_lists(&self, query: ListQueryFilter) -> Result<Vec<ShoppingList>, MarketplaceError> {
        self.db.search_lists(query).await
    }

    /// Registers a user record for the out-of-scope user collaborator (test and glue code convenience).
    pub async fn register_user(&self, user: NewUser) -> Result<User, MarketplaceError> {
        self.db.insert_user(user).await
    }

    /// Force-runs the deadline and expiry transitions across all lists, on behalf of a scheduler collaborator.
    /// The same transition logic runs lazily inside each flow, so calling this is an optimisation, never a
    /// correctness requirement.
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepResult, MarketplaceError> {
        let closed = self.db.close_due_bidding(now).await?;
        let expired = self.db.expire_due_lists(now).await?;
        Ok(SweepResult { closed, expired })
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

fn validate_new_list(list: &NewShoppingList, now: DateTime<Utc>) -> Result<(), MarketplaceError> {
    if list.title.trim().is_empty() {
        return Err(MarketplaceError::Validation("A shopping list needs a title".to_string()));
    }
    if !list.estimated_total.is_positive() {
        return Err(MarketplaceError::Validation(format!(
            "Estimated total must be positive, got {}",
            list.estimated_total
        )));
    }
    if let Some(budget) = list.max_budget {
        if !budget.is_positive() {
            return Err(MarketplaceError::Validation(format!("Max budget must be positive, got {budget}")));
        }
    }
    if list.bidding_deadline <= now {
        return Err(MarketplaceError::Validation("The bidding deadline must be in the future".to_string()));
    }
    if list.preferred_delivery_time <= list.bidding_deadline {
        return Err(MarketplaceError::Validation(
            "The preferred delivery time must be after the bidding deadline".to_string(),
        ));
    }
    if list.expires_at < list.bidding_deadline {
        return Err(MarketplaceError::Validation("A list cannot expire before its bidding deadline".to_string()));
    }
    Ok(())
}
