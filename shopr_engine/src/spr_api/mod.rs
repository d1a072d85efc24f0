//! The engine public API.
//!
//! Each API struct is generic over a backend implementing [`crate::traits::MarketplaceDatabase`] and owns the input
//! validation and event emission for its slice of the workflow; the backend owns atomicity and the data invariants.
pub mod bid_flow_api;
pub mod list_api;
pub mod market_objects;
pub mod review_api;
pub mod settlement_api;
