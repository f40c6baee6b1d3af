//! In-memory adapters.
//!
//! Mirror the PostgreSQL adapters' conditional semantics for tests and local
//! runs without a database.

mod commission_repository;
mod profile_store;
mod promo_code_repository;
mod webhook_event_log;

pub use commission_repository::InMemoryCommissionRepository;
pub use profile_store::InMemoryProfileStore;
pub use promo_code_repository::InMemoryPromoCodeRepository;
pub use webhook_event_log::InMemoryWebhookEventLog;
