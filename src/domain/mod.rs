//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, errors)
//! - `billing` - Stripe event vocabulary, status mapping, profile write rules
//!   and influencer commissions

pub mod billing;
pub mod foundation;
