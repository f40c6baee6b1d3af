//! Adapters - Implementations of port interfaces.
//!
//! - `http` - Axum webhook endpoint
//! - `memory` - In-memory stores for tests and local runs
//! - `postgres` - sqlx-backed stores
//! - `stripe` - Read-only Stripe API client and a scriptable mock

pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;
