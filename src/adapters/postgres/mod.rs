//! PostgreSQL adapters - Database implementations for the billing ports.
//!
//! - `PostgresWebhookEventLog` - Event dedup and audit trail
//! - `PostgresProfileStore` - Guarded profile writes
//! - `PostgresPromoCodeRepository` - Promo codes and usage rows
//! - `PostgresCommissionRepository` - Insert-if-absent commissions
//!
//! The schema lives in `migrations/` and is embedded at compile time.

mod commission_repository;
mod profile_store;
mod promo_code_repository;
mod webhook_event_log;

pub use commission_repository::PostgresCommissionRepository;
pub use profile_store::PostgresProfileStore;
pub use promo_code_repository::PostgresPromoCodeRepository;
pub use webhook_event_log::PostgresWebhookEventLog;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::domain::foundation::DomainError;

/// Opens a connection pool sized by `config`.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DomainError> {
    PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(config.idle_timeout())
        .max_lifetime(config.max_lifetime())
        .connect(&config.url)
        .await
        .map_err(|e| DomainError::database("Failed to connect to PostgreSQL", e))
}

/// Applies the embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DomainError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DomainError::database("Failed to run migrations", e))?;
    tracing::info!("Database migrations applied");
    Ok(())
}
