//! Axum router for the webhook endpoint.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{handle_stripe_webhook, health, BillingAppState};

/// # Routes
/// - `POST /webhooks/stripe` - Stripe webhook deliveries (signature verified, no auth)
/// - `GET /health` - Liveness probe
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/webhooks/stripe", post(handle_stripe_webhook))
        .route("/health", get(health))
}

/// Create the webhook router with its state applied.
pub fn webhook_router(state: BillingAppState) -> Router {
    webhook_routes().with_state(state)
}
