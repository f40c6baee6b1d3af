//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the billing domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `WebhookEventLog` - Append-mostly log of received webhook events
//! - `ProfileStore` - Customer profile billing fields with conditional writes
//! - `PromoCodeRepository` - Promo codes and per-subscriber usage rows
//! - `CommissionRepository` - Insert-once influencer commissions
//!
//! ## External Ports
//!
//! - `BillingProvider` - Read-only Stripe lookups for payload enrichment

mod billing_provider;
mod commission_repository;
mod profile_store;
mod promo_code_repository;
mod webhook_event_log;

pub use billing_provider::{BillingProvider, ProviderError, ProviderErrorCode};
pub use commission_repository::CommissionRepository;
pub use profile_store::ProfileStore;
pub use promo_code_repository::PromoCodeRepository;
pub use webhook_event_log::{ReceiveOutcome, WebhookEventLog, WebhookEventRecord, WebhookResult};
