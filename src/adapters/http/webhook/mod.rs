//! HTTP adapter for the Stripe webhook.
//!
//! - `POST /webhooks/stripe` - Reconcile a Stripe event
//! - `GET /health` - Liveness probe

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::{ErrorResponse, HealthResponse, WebhookAck};
pub use handlers::{BillingAppState, WebhookApiError, SIGNATURE_HEADER};
pub use routes::{webhook_router, webhook_routes};
