//! Subscription lifecycle engine for Azora.
//!
//! Trial → promotional → full-price transitions with time-boxed pricing,
//! materialized lazily by an idempotent transition operation. Records live
//! behind the `SubscriptionStore` trait; the DashMap store serves development
//! and tests, swap in a database-backed store for production.

pub mod catalog;
pub mod manager;
pub mod notification;
pub mod phase;
pub mod store;

pub use catalog::PricingCatalog;
pub use manager::{
    SubscriptionManager, SubscriptionView, SweepFailure, SweepReport, TransitionOutcome,
};
pub use notification::{NotificationDecision, NotificationPolicy};
pub use store::{InMemorySubscriptionStore, SubscriptionStore};
