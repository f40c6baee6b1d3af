//! HTTP adapters - the service's inbound surface.

pub mod webhook;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

pub use webhook::{webhook_router, BillingAppState};

/// The full application router with request tracing, a body limit and a
/// request timeout.
pub fn app_router(state: BillingAppState, server: &ServerConfig) -> Router {
    webhook_router(state)
        .layer(DefaultBodyLimit::max(server.max_body_bytes))
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(TraceLayer::new_for_http())
}
