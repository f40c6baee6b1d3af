//! Webhook processor - Orchestrates idempotent webhook event handling.
//!
//! This module provides the coordination layer between the webhook event log
//! and the per-event handlers, ensuring a processed event is never re-applied.
//!
//! ## Design
//!
//! The processor follows these steps:
//! 1. Record the event as received (or learn it is a duplicate)
//! 2. Skip events already marked processed
//! 3. Dispatch to the handler registered for the event type
//! 4. Mark processed on success, or record the error and surface it
//!
//! ## Redelivery
//!
//! An event whose earlier attempt failed, or that is concurrently in flight,
//! is logged but unprocessed. It is dispatched again: every handler write is
//! an idempotent upsert or an insert guarded by a unique key.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::billing::{StripeEvent, StripeEventType, WebhookError};
use crate::ports::{ReceiveOutcome, WebhookEventLog, WebhookResult};

/// Handler for a specific type of Stripe webhook event.
///
/// Implementations hold only their collaborators and must be safe to run
/// more than once for the same event.
#[async_trait]
pub trait WebhookEventHandler: Send + Sync {
    /// Returns the event type(s) this handler processes.
    fn handles(&self) -> Vec<StripeEventType>;

    /// Handles the webhook event.
    ///
    /// Returns `Err(WebhookError::Ignored(_))` if the event should be
    /// acknowledged but not acted on.
    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError>;
}

/// Dispatches webhook events to the appropriate handler.
#[async_trait]
pub trait WebhookDispatcher: Send + Sync {
    /// Find a handler for the given event type.
    fn get_handler(&self, event_type: &StripeEventType) -> Option<&dyn WebhookEventHandler>;

    /// Dispatch an event to its handler.
    ///
    /// Returns `Err(WebhookError::Ignored)` if no handler is registered.
    async fn dispatch(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let event_type = event.parsed_type();
        match self.get_handler(&event_type) {
            Some(handler) => handler.handle(event).await,
            None => Err(WebhookError::Ignored(format!(
                "No handler for event type: {}",
                event.event_type
            ))),
        }
    }
}

/// Processes webhook events with idempotency guarantees.
pub struct IdempotentWebhookProcessor<D: WebhookDispatcher> {
    log: Arc<dyn WebhookEventLog>,
    dispatcher: D,
}

impl<D: WebhookDispatcher> IdempotentWebhookProcessor<D> {
    pub fn new(log: Arc<dyn WebhookEventLog>, dispatcher: D) -> Self {
        Self { log, dispatcher }
    }

    /// Process a verified webhook event.
    ///
    /// `raw` is the event as received; it is stored in the log verbatim.
    ///
    /// # Returns
    ///
    /// - `Ok(WebhookResult::Processed)` - Handlers ran (or the type is unhandled)
    /// - `Ok(WebhookResult::AlreadyProcessed)` - An earlier delivery completed
    /// - `Err(_)` - A handler failed; the error is recorded on the log row
    pub async fn process(
        &self,
        event: &StripeEvent,
        raw: &serde_json::Value,
    ) -> Result<WebhookResult, WebhookError> {
        let outcome = self
            .log
            .record_received(&event.id, &event.event_type, raw)
            .await?;

        match outcome {
            ReceiveOutcome::Duplicate { processed: true } => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "Duplicate webhook delivery, already processed"
                );
                return Ok(WebhookResult::AlreadyProcessed);
            }
            ReceiveOutcome::Duplicate { processed: false } => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "Redelivery of unprocessed webhook event, reprocessing"
                );
            }
            ReceiveOutcome::New => {}
        }

        match self.dispatcher.dispatch(event).await {
            Ok(()) => {}
            Err(WebhookError::Ignored(reason)) => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    reason = %reason,
                    "Webhook event acknowledged without action"
                );
            }
            Err(err) => {
                tracing::error!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    error = %err,
                    retryable = err.is_retryable(),
                    "Webhook handler failed"
                );
                if let Err(log_err) = self.log.record_error(&event.id, &err.to_string()).await {
                    tracing::warn!(
                        event_id = %event.id,
                        error = %log_err,
                        "Failed to record webhook error"
                    );
                }
                return Err(err);
            }
        }

        self.log.mark_processed(&event.id).await?;
        Ok(WebhookResult::Processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryWebhookEventLog;
    use crate::domain::billing::stripe_event::StripeEventBuilder;
    use std::sync::atomic::{AtomicU32, Ordering};

    // ══════════════════════════════════════════════════════════════
    // Test Infrastructure
    // ══════════════════════════════════════════════════════════════

    /// Mock handler that tracks invocations.
    struct MockHandler {
        handles_types: Vec<StripeEventType>,
        call_count: AtomicU32,
        failures_left: AtomicU32,
        should_ignore: bool,
    }

    impl MockHandler {
        fn new(handles: Vec<StripeEventType>) -> Self {
            Self {
                handles_types: handles,
                call_count: AtomicU32::new(0),
                failures_left: AtomicU32::new(0),
                should_ignore: false,
            }
        }

        /// Fails the first `times` calls, then succeeds.
        fn failing(handles: Vec<StripeEventType>, times: u32) -> Self {
            let handler = Self::new(handles);
            handler.failures_left.store(times, Ordering::SeqCst);
            handler
        }

        fn ignoring(handles: Vec<StripeEventType>) -> Self {
            Self {
                should_ignore: true,
                ..Self::new(handles)
            }
        }

        fn call_count(&self) -> u32 {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WebhookEventHandler for MockHandler {
        fn handles(&self) -> Vec<StripeEventType> {
            self.handles_types.clone()
        }

        async fn handle(&self, _event: &StripeEvent) -> Result<(), WebhookError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let failures = self.failures_left.load(Ordering::SeqCst);
            if failures > 0 {
                self.failures_left.store(failures - 1, Ordering::SeqCst);
                Err(WebhookError::StoreWrite("Simulated failure".to_string()))
            } else if self.should_ignore {
                Err(WebhookError::Ignored("Test ignore".to_string()))
            } else {
                Ok(())
            }
        }
    }

    /// Simple dispatcher that routes to a single handler.
    struct SingleHandlerDispatcher {
        handler: Arc<MockHandler>,
    }

    #[async_trait]
    impl WebhookDispatcher for SingleHandlerDispatcher {
        fn get_handler(&self, event_type: &StripeEventType) -> Option<&dyn WebhookEventHandler> {
            if self.handler.handles_types.contains(event_type) {
                Some(self.handler.as_ref())
            } else {
                None
            }
        }
    }

    fn processor_with(
        handler: Arc<MockHandler>,
    ) -> (
        IdempotentWebhookProcessor<SingleHandlerDispatcher>,
        InMemoryWebhookEventLog,
    ) {
        let log = InMemoryWebhookEventLog::new();
        let processor = IdempotentWebhookProcessor::new(
            Arc::new(log.clone()),
            SingleHandlerDispatcher { handler },
        );
        (processor, log)
    }

    fn test_event(id: &str, event_type: &str) -> (StripeEvent, serde_json::Value) {
        let event = StripeEventBuilder::new().id(id).event_type(event_type).build();
        let raw = serde_json::json!({"id": id, "type": event_type});
        (event, raw)
    }

    // ══════════════════════════════════════════════════════════════
    // WebhookDispatcher Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn dispatcher_returns_none_for_unregistered_type() {
        let handler = Arc::new(MockHandler::new(vec![StripeEventType::CheckoutSessionCompleted]));
        let dispatcher = SingleHandlerDispatcher { handler };

        assert!(dispatcher
            .get_handler(&StripeEventType::CheckoutSessionCompleted)
            .is_some());
        assert!(dispatcher
            .get_handler(&StripeEventType::InvoicePaymentFailed)
            .is_none());
    }

    #[tokio::test]
    async fn dispatcher_ignores_unknown_event_types() {
        let handler = Arc::new(MockHandler::new(vec![StripeEventType::CheckoutSessionCompleted]));
        let dispatcher = SingleHandlerDispatcher { handler };
        let (event, _) = test_event("evt_unknown", "unknown.event.type");

        let result = dispatcher.dispatch(&event).await;

        assert!(matches!(result, Err(WebhookError::Ignored(_))));
    }

    // ══════════════════════════════════════════════════════════════
    // IdempotentWebhookProcessor Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn processor_processes_new_event_successfully() {
        let handler = Arc::new(MockHandler::new(vec![StripeEventType::CheckoutSessionCompleted]));
        let (processor, log) = processor_with(handler.clone());

        let (event, raw) = test_event("evt_new", "checkout.session.completed");
        let result = processor.process(&event, &raw).await;

        assert_eq!(result.unwrap(), WebhookResult::Processed);
        assert_eq!(handler.call_count(), 1);
        let record = log.find_by_event_id("evt_new").await.unwrap().unwrap();
        assert!(record.processed);
        assert_eq!(record.payload, raw);
    }

    #[tokio::test]
    async fn processor_skips_processed_duplicate() {
        let handler = Arc::new(MockHandler::new(vec![StripeEventType::CheckoutSessionCompleted]));
        let (processor, _) = processor_with(handler.clone());
        let (event, raw) = test_event("evt_dup", "checkout.session.completed");

        processor.process(&event, &raw).await.unwrap();
        let second = processor.process(&event, &raw).await.unwrap();

        assert_eq!(second, WebhookResult::AlreadyProcessed);
        assert_eq!(handler.call_count(), 1);
    }

    #[tokio::test]
    async fn processor_records_failure_and_retries_on_redelivery() {
        let handler = Arc::new(MockHandler::failing(
            vec![StripeEventType::InvoicePaymentSucceeded],
            1,
        ));
        let (processor, log) = processor_with(handler.clone());
        let (event, raw) = test_event("evt_fail", "invoice.payment_succeeded");

        let first = processor.process(&event, &raw).await;
        assert!(matches!(first, Err(WebhookError::StoreWrite(_))));
        let failed = log.find_by_event_id("evt_fail").await.unwrap().unwrap();
        assert!(!failed.processed);
        assert!(failed.error.unwrap().contains("Simulated failure"));

        let second = processor.process(&event, &raw).await.unwrap();
        assert_eq!(second, WebhookResult::Processed);
        assert_eq!(handler.call_count(), 2);
        let done = log.find_by_event_id("evt_fail").await.unwrap().unwrap();
        assert!(done.processed);
        assert!(done.error.is_none());
    }

    #[tokio::test]
    async fn processor_marks_ignored_events_processed() {
        let handler = Arc::new(MockHandler::ignoring(vec![
            StripeEventType::CheckoutSessionCompleted,
        ]));
        let (processor, log) = processor_with(handler.clone());
        let (event, raw) = test_event("evt_ign", "checkout.session.completed");

        let result = processor.process(&event, &raw).await.unwrap();

        assert_eq!(result, WebhookResult::Processed);
        assert!(log.find_by_event_id("evt_ign").await.unwrap().unwrap().processed);
    }

    #[tokio::test]
    async fn processor_logs_unknown_types_as_processed() {
        let handler = Arc::new(MockHandler::new(vec![StripeEventType::CheckoutSessionCompleted]));
        let (processor, log) = processor_with(handler.clone());
        let (event, raw) = test_event("evt_unk", "charge.refunded");

        let result = processor.process(&event, &raw).await.unwrap();

        assert_eq!(result, WebhookResult::Processed);
        assert_eq!(handler.call_count(), 0);
        let record = log.find_by_event_id("evt_unk").await.unwrap().unwrap();
        assert!(record.processed);
        assert_eq!(record.event_type, "charge.refunded");
    }
}
