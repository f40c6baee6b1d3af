//! Reconciler entry point: verify, parse, then process exactly once.

use std::sync::Arc;

use crate::domain::billing::{StripeEvent, StripeWebhookVerifier, WebhookError};
use crate::ports::{WebhookEventLog, WebhookResult};

use super::processor::IdempotentWebhookProcessor;
use super::registry::HandlerRegistry;
use super::BillingServices;

/// Provider-agnostic core behind the webhook endpoint.
pub struct StripeReconciler {
    verifier: StripeWebhookVerifier,
    processor: IdempotentWebhookProcessor<HandlerRegistry>,
}

impl StripeReconciler {
    /// Wires the standard handler table.
    pub fn new(
        verifier: StripeWebhookVerifier,
        log: Arc<dyn WebhookEventLog>,
        services: BillingServices,
    ) -> Self {
        Self::with_registry(verifier, log, HandlerRegistry::standard(services))
    }

    pub fn with_registry(
        verifier: StripeWebhookVerifier,
        log: Arc<dyn WebhookEventLog>,
        registry: HandlerRegistry,
    ) -> Self {
        Self {
            verifier,
            processor: IdempotentWebhookProcessor::new(log, registry),
        }
    }

    /// Authenticates the raw body. Touches no state.
    pub fn verify(&self, payload: &[u8], signature: Option<&str>) -> Result<(), WebhookError> {
        self.verifier.verify(payload, signature)
    }

    /// Decodes a verified body, returning the event and the JSON it came from.
    pub fn parse_event(
        &self,
        payload: &[u8],
    ) -> Result<(StripeEvent, serde_json::Value), WebhookError> {
        let raw: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::MalformedPayload(format!("Invalid JSON: {}", e)))?;
        let event = self.verifier.parse_value(&raw)?;
        Ok((event, raw))
    }

    pub async fn process(
        &self,
        event: &StripeEvent,
        raw: &serde_json::Value,
    ) -> Result<WebhookResult, WebhookError> {
        self.processor.process(event, raw).await
    }

    /// Full pipeline for one delivery.
    pub async fn handle(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookResult, WebhookError> {
        if let Err(err) = self.verify(payload, signature) {
            tracing::warn!(error = %err, class = ?err.class(), "Rejected webhook delivery");
            return Err(err);
        }

        let (event, raw) = match self.parse_event(payload) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(error = %err, "Rejected webhook payload");
                return Err(err);
            }
        };

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            livemode = event.livemode,
            "Webhook received"
        );
        self.process(&event, &raw).await
    }
}
