use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopr_common::Money;
use sqlx::FromRow;

use crate::db_types::ListStatus;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ListQueryFilter {
    pub client_id: Option<i64>,
    pub selected_shopper: Option<i64>,
    pub store_city: Option<String>,
    pub statuses: Vec<ListStatus>,
}

impl ListQueryFilter {
    pub fn with_client_id(mut self, client_id: i64) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn with_selected_shopper(mut self, shopper_id: i64) -> Self {
        self.selected_shopper = Some(shopper_id);
        self
    }

    pub fn with_store_city<S: Into<String>>(mut self, city: S) -> Self {
        self.store_city = Some(city.into());
        self
    }

    pub fn with_status(mut self, status: ListStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.client_id.is_none() &&
            self.selected_shopper.is_none() &&
            self.store_city.is_none() &&
            self.statuses.is_empty()
    }
}

impl Display for ListQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(client_id) = self.client_id {
            write!(f, "client: {client_id}. ")?;
        }
        if let Some(shopper_id) = self.selected_shopper {
            write!(f, "selected shopper: {shopper_id}. ")?;
        }
        if let Some(city) = &self.store_city {
            write!(f, "store city: {city}. ")?;
        }
        if !self.statuses.is_empty() {
            let statuses = self.statuses.iter().map(ToString::to_string).collect::<Vec<String>>().join(", ");
            write!(f, "status in [{statuses}]. ")?;
        }
        Ok(())
    }
}

/// One row of the bid listing a client chooses from: the active bid joined with the shopper's display name and
/// average rating.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BidListing {
    pub id: i64,
    pub shopping_list_id: i64,
    pub shopper_id: i64,
    pub shopper_name: String,
    pub shopper_rating: f64,
    pub amount: Money,
    pub message: String,
    pub estimated_minutes: i64,
    pub distance_to_store: f64,
    pub created_at: DateTime<Utc>,
}
