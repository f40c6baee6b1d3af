//! Application layer - webhook reconciliation handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;

pub use handlers::{BillingServices, StripeReconciler};
