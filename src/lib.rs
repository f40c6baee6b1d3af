//! BabyPlan Billing - Stripe subscription reconciliation.
//!
//! Receives Stripe webhooks, verifies them, and reconciles subscription,
//! invoice and checkout events onto customer profiles exactly once. Promo
//! code conversions and influencer commission milestones are tracked along
//! the way.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::adapters::http::BillingAppState;
use crate::adapters::postgres::{
    PostgresCommissionRepository, PostgresProfileStore, PostgresPromoCodeRepository,
    PostgresWebhookEventLog,
};
use crate::adapters::stripe::StripeClient;
use crate::application::{BillingServices, StripeReconciler};
use crate::config::{AppConfig, ServerConfig};
use crate::domain::foundation::{DomainError, ErrorCode};

/// Installs the global subscriber: JSON in production, human-readable otherwise.
///
/// `RUST_LOG` takes precedence over `server.log_level`.
pub fn init_tracing(server: &ServerConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    if server.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Connects to PostgreSQL and Stripe and wires the webhook state.
pub async fn build_state(config: &AppConfig) -> Result<BillingAppState, DomainError> {
    let pool = adapters::postgres::connect(&config.database).await?;
    if config.database.run_migrations {
        adapters::postgres::run_migrations(&pool).await?;
    }

    let provider = StripeClient::new(config.payment.stripe_config()).map_err(|e| {
        DomainError::new(
            ErrorCode::InternalError,
            format!("Failed to build Stripe client: {}", e),
        )
    })?;

    let services = BillingServices::new(
        Arc::new(PostgresProfileStore::new(pool.clone())),
        Arc::new(PostgresPromoCodeRepository::new(pool.clone())),
        Arc::new(PostgresCommissionRepository::new(pool.clone())),
        Arc::new(provider),
        config.status_mapper(),
        config.commission,
    );
    let reconciler = StripeReconciler::new(
        config.payment.verifier(),
        Arc::new(PostgresWebhookEventLog::new(pool)),
        services,
    );

    Ok(BillingAppState::new(reconciler))
}
