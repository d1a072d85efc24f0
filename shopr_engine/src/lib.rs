//! Shopr Workflow Engine
//!
//! The Shopr engine is the backend core of a grocery-shopping marketplace: clients post shopping lists, shoppers bid
//! on them, a client accepts one bid, and the engine records the resulting transaction and payout handoff. This crate
//! contains the data model, the bid-award workflow and its invariants. It is transport-agnostic; any REST/RPC layer
//! can front the APIs exposed here.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`SqliteDatabase`] and the backend traits). You should never need to access
//!    the database directly. Instead, use the public API provided by the engine. The exception is the data types used
//!    in the database. These are defined in the [`db_types`] module and are public.
//! 2. The engine public API ([`mod@spr_api`]): [`ListApi`] for list lifecycle, [`BidFlowApi`] for bidding and the
//!    award flow, [`ReviewApi`] for reviews and rating aggregation, and [`SettlementApi`] for the payment-worker
//!    handoff. Backends implement the traits in [`mod@traits`] to drive these APIs.
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted when certain actions
//! occur within the workflow, for example when a bid is awarded, a [`events::BidAwardedEvent`] is emitted. A simple
//! actor framework is used so that you can easily hook into these events and perform custom actions.
pub mod db_types;
pub mod events;
mod spr_api;
#[cfg(feature = "sqlite")]
pub mod sweep_worker;
mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use spr_api::{
    bid_flow_api::BidFlowApi,
    list_api::ListApi,
    market_objects,
    market_objects::{BidListing, ListQueryFilter},
    review_api::ReviewApi,
    settlement_api::SettlementApi,
};
pub use traits::{AwardOutcome, ListingManagement, MarketplaceDatabase, MarketplaceError, SweepResult};
