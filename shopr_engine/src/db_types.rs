use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopr_common::{FeePercentage, Money};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid status value: {0}")]
pub struct StatusConversionError(String);

//--------------------------------------     ListStatus      ---------------------------------------------------------
/// The lifecycle state of a shopping list.
///
/// Lists start `open` and leave it along one of three paths: the bidding deadline passes (`bidding_closed`), the
/// client cancels, or the list expires unawarded. Awarding a bid moves an `open`/`bidding_closed` list to `assigned`,
/// after which the fulfilment progression `in_progress` -> `delivered` is a pair of thin status writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ListStatus {
    /// Accepting bids, deadline not yet reached.
    Open,
    /// The bidding deadline has passed; the client can still award one of the existing bids.
    BiddingClosed,
    /// A bid has been awarded and a shopper selected.
    Assigned,
    /// The selected shopper is out shopping.
    InProgress,
    /// Terminal: the goods were delivered.
    Delivered,
    /// Terminal: cancelled by the client while still open.
    Cancelled,
    /// Terminal: the list passed its expiry time without an award.
    Expired,
}

impl ListStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ListStatus::Delivered | ListStatus::Cancelled | ListStatus::Expired)
    }

    /// Whether a bid may still be awarded in this state.
    pub fn is_awardable(&self) -> bool {
        matches!(self, ListStatus::Open | ListStatus::BiddingClosed)
    }
}

impl Display for ListStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ListStatus::Open => "open",
            ListStatus::BiddingClosed => "bidding_closed",
            ListStatus::Assigned => "assigned",
            ListStatus::InProgress => "in_progress",
            ListStatus::Delivered => "delivered",
            ListStatus::Cancelled => "cancelled",
            ListStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ListStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "bidding_closed" => Ok(Self::BiddingClosed),
            "assigned" => Ok(Self::Assigned),
            "in_progress" => Ok(Self::InProgress),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(StatusConversionError(format!("Invalid list status: {other}"))),
        }
    }
}

//--------------------------------------     BidStatus       ---------------------------------------------------------
/// The lifecycle state of a bid. This enum is the single source of truth for bid liveness; there is no separate
/// `is_active` column to drift out of sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Active,
    Won,
    Lost,
    Withdrawn,
}

impl Display for BidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BidStatus::Active => "active",
            BidStatus::Won => "won",
            BidStatus::Lost => "lost",
            BidStatus::Withdrawn => "withdrawn",
        };
        write!(f, "{s}")
    }
}

impl FromStr for BidStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            "withdrawn" => Ok(Self::Withdrawn),
            other => Err(StatusConversionError(format!("Invalid bid status: {other}"))),
        }
    }
}

//--------------------------------------  TransactionStatus  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    Disputed,
}

impl TransactionStatus {
    /// The legal status moves for the external payment worker.
    ///
    /// | From \ To  | Processing | Completed | Failed | Refunded | Disputed |
    /// |------------|------------|-----------|--------|----------|----------|
    /// | Pending    | yes        |           | yes    |          |          |
    /// | Processing |            | yes       | yes    |          |          |
    /// | Completed  |            |           |        | yes      | yes      |
    ///
    /// Everything else is forbidden.
    pub fn can_transition_to(&self, to: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, to),
            (Pending, Processing) | (Pending, Failed) | (Processing, Completed) | (Processing, Failed) |
                (Completed, Refunded) | (Completed, Disputed)
        )
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Refunded => "refunded",
            TransactionStatus::Disputed => "disputed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TransactionStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            "disputed" => Ok(Self::Disputed),
            other => Err(StatusConversionError(format!("Invalid transaction status: {other}"))),
        }
    }
}

//--------------------------------------    PayoutStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PayoutStatus {
    pub fn can_transition_to(&self, to: PayoutStatus) -> bool {
        use PayoutStatus::*;
        matches!((self, to), (Pending, Processing) | (Pending, Failed) | (Processing, Completed) | (Processing, Failed))
    }
}

impl Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PayoutStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(StatusConversionError(format!("Invalid payout status: {other}"))),
        }
    }
}

//--------------------------------------        User         ---------------------------------------------------------
/// A thin projection of the user collaborator. Registration, authentication and profile management live outside this
/// engine; the workflow only reads users for display joins and writes `average_rating`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub average_rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
}

impl NewUser {
    pub fn new<S: Into<String>>(email: S) -> Self {
        Self { email: email.into(), display_name: String::new() }
    }

    pub fn with_display_name<S: Into<String>>(mut self, name: S) -> Self {
        self.display_name = name.into();
        self
    }
}

//--------------------------------------    ShoppingList     ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ShoppingList {
    pub id: i64,
    pub client_id: i64,
    pub title: String,
    pub description: String,
    pub store_name: String,
    pub store_city: String,
    /// Free-form item payload, e.g. `[{"name": "Milk", "quantity": 2}]`
    pub items: serde_json::Value,
    pub estimated_total: Money,
    pub max_budget: Option<Money>,
    pub platform_fee_percentage: FeePercentage,
    pub preferred_delivery_time: DateTime<Utc>,
    pub bidding_deadline: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ListStatus,
    pub selected_shopper: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   NewShoppingList   ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShoppingList {
    pub client_id: i64,
    pub title: String,
    pub description: String,
    pub store_name: String,
    pub store_city: String,
    pub items: serde_json::Value,
    pub estimated_total: Money,
    pub max_budget: Option<Money>,
    pub platform_fee_percentage: FeePercentage,
    pub preferred_delivery_time: DateTime<Utc>,
    pub bidding_deadline: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewShoppingList {
    pub fn new<S: Into<String>>(
        client_id: i64,
        title: S,
        estimated_total: Money,
        bidding_deadline: DateTime<Utc>,
        preferred_delivery_time: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            client_id,
            title: title.into(),
            description: String::new(),
            store_name: String::new(),
            store_city: String::new(),
            items: serde_json::Value::Array(Vec::new()),
            estimated_total,
            max_budget: None,
            platform_fee_percentage: FeePercentage::default(),
            preferred_delivery_time,
            bidding_deadline,
            expires_at,
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_store<S: Into<String>>(mut self, name: S, city: S) -> Self {
        self.store_name = name.into();
        self.store_city = city.into();
        self
    }

    pub fn with_items(mut self, items: serde_json::Value) -> Self {
        self.items = items;
        self
    }

    pub fn with_max_budget(mut self, budget: Money) -> Self {
        self.max_budget = Some(budget);
        self
    }

    pub fn with_fee_percentage(mut self, fee: FeePercentage) -> Self {
        self.platform_fee_percentage = fee;
        self
    }
}

//--------------------------------------         Bid         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub shopper_id: i64,
    pub shopping_list_id: i64,
    pub amount: Money,
    /// Shopper's message to the client.
    pub message: String,
    /// Estimated shopping time in minutes, declared by the shopper.
    pub estimated_minutes: i64,
    /// Distance from shopper to store, captured at bid time.
    pub distance_to_store: f64,
    pub status: BidStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bid {
    /// Derived liveness accessor. Liveness is never stored separately from `status`, so the two cannot diverge.
    pub fn is_active(&self) -> bool {
        self.status == BidStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBid {
    pub shopper_id: i64,
    pub shopping_list_id: i64,
    pub amount: Money,
    pub message: String,
    pub estimated_minutes: i64,
    pub distance_to_store: f64,
}

impl NewBid {
    pub fn new(shopper_id: i64, shopping_list_id: i64, amount: Money) -> Self {
        Self { shopper_id, shopping_list_id, amount, message: String::new(), estimated_minutes: 0, distance_to_store: 0.0 }
    }

    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_estimated_minutes(mut self, minutes: i64) -> Self {
        self.estimated_minutes = minutes;
        self
    }

    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance_to_store = distance;
        self
    }
}

//--------------------------------------     BidHistory      ---------------------------------------------------------
/// Append-only audit record of a bid amendment. Never updated or deleted independently of its bid.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BidHistory {
    pub id: i64,
    pub bid_id: i64,
    pub old_amount: Money,
    pub new_amount: Money,
    pub changed_by: Option<i64>,
    pub changed_at: DateTime<Utc>,
}

//--------------------------------------     Transaction     ---------------------------------------------------------
/// The financial record created by the award flow, one-to-one with a shopping list and its winning bid.
///
/// `platform_fee + shopper_payout == bid_amount` and `total_charged == bid_amount` always hold; the schema enforces
/// them with CHECK constraints on top of the fee calculator guaranteeing them by construction.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub shopping_list_id: i64,
    pub bid_id: i64,
    pub bid_amount: Money,
    pub platform_fee: Money,
    pub shopper_payout: Money,
    pub total_charged: Money,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

//--------------------------------------       Payout        ---------------------------------------------------------
/// Settlement of the shopper's share of a completed transaction on the external payment rail.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payout {
    pub id: i64,
    pub shopper_id: i64,
    pub transaction_id: i64,
    pub amount: Money,
    pub status: PayoutStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

//--------------------------------------       Review        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub reviewer_id: i64,
    pub reviewee_id: i64,
    pub shopping_list_id: i64,
    pub rating: i64,
    pub comment: String,
    pub communication_rating: Option<i64>,
    pub timeliness_rating: Option<i64>,
    pub accuracy_rating: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReview {
    pub reviewer_id: i64,
    pub reviewee_id: i64,
    pub shopping_list_id: i64,
    pub rating: i64,
    pub comment: String,
    pub communication_rating: Option<i64>,
    pub timeliness_rating: Option<i64>,
    pub accuracy_rating: Option<i64>,
}

impl NewReview {
    pub fn new(reviewer_id: i64, reviewee_id: i64, shopping_list_id: i64, rating: i64) -> Self {
        Self {
            reviewer_id,
            reviewee_id,
            shopping_list_id,
            rating,
            comment: String::new(),
            communication_rating: None,
            timeliness_rating: None,
            accuracy_rating: None,
        }
    }

    pub fn with_comment<S: Into<String>>(mut self, comment: S) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_sub_ratings(mut self, communication: i64, timeliness: i64, accuracy: i64) -> Self {
        self.communication_rating = Some(communication);
        self.timeliness_rating = Some(timeliness);
        self.accuracy_rating = Some(accuracy);
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn list_status_roundtrips_through_its_string_form() {
        for status in [
            ListStatus::Open,
            ListStatus::BiddingClosed,
            ListStatus::Assigned,
            ListStatus::InProgress,
            ListStatus::Delivered,
            ListStatus::Cancelled,
            ListStatus::Expired,
        ] {
            assert_eq!(status.to_string().parse::<ListStatus>().unwrap(), status);
        }
        assert!("paused".parse::<ListStatus>().is_err());
    }

    #[test]
    fn terminal_states_are_not_awardable() {
        assert!(ListStatus::Open.is_awardable());
        assert!(ListStatus::BiddingClosed.is_awardable());
        for status in [ListStatus::Delivered, ListStatus::Cancelled, ListStatus::Expired] {
            assert!(status.is_terminal());
            assert!(!status.is_awardable());
        }
        assert!(!ListStatus::Assigned.is_awardable());
        assert!(!ListStatus::Assigned.is_terminal());
    }

    #[test]
    fn transaction_transitions_follow_the_matrix() {
        use TransactionStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Refunded));
        assert!(Completed.can_transition_to(Disputed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn a_bids_liveness_follows_its_status() {
        for (status, parsed) in
            [("active", BidStatus::Active), ("won", BidStatus::Won), ("lost", BidStatus::Lost), ("withdrawn", BidStatus::Withdrawn)]
        {
            assert_eq!(status.parse::<BidStatus>().unwrap(), parsed);
            assert_eq!(parsed.to_string(), status);
        }
    }
}
