//! Stripe billing provider adapter.
//!
//! Implements the read-only `BillingProvider` port used to enrich webhook
//! payloads:
//! - Subscriptions, invoices (payment intent expanded), payment methods
//! - Customers and promotion codes
//!
//! Webhook signature verification lives in the domain
//! (`StripeWebhookVerifier`), not here; this adapter only performs lookups.

mod client;
mod mock_billing_provider;

pub use client::{StripeClient, StripeConfig, DEFAULT_API_BASE_URL};
pub use mock_billing_provider::{MethodCall, MockBillingProvider};
