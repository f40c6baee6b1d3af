//! HTTP handlers for the Stripe webhook endpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::StripeReconciler;
use crate::domain::billing::{WebhookError, WebhookErrorClass};
use crate::ports::WebhookResult;

use super::dto::{ErrorResponse, HealthResponse, WebhookAck};

/// Header carrying `t=<unix>,v1=<hex>` signatures.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct BillingAppState {
    pub reconciler: Arc<StripeReconciler>,
}

impl BillingAppState {
    pub fn new(reconciler: StripeReconciler) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/stripe - Reconcile one Stripe event.
///
/// The body is taken as raw bytes: the signature covers the exact payload.
pub async fn handle_stripe_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let result = state.reconciler.handle(&body, signature).await?;
    if result == WebhookResult::AlreadyProcessed {
        tracing::debug!("Acknowledged duplicate delivery");
    }

    Ok((StatusCode::OK, Json(WebhookAck::received())))
}

/// GET /health - Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse::ok())
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts webhook errors to HTTP responses.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        if self.0.class() == WebhookErrorClass::UnknownEventType {
            return (status, Json(WebhookAck::received())).into_response();
        }
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Webhook failed, Stripe will redeliver");
        }
        (status, Json(ErrorResponse::new(self.0.to_string()))).into_response()
    }
}
