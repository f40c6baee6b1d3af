//! WebhookEventLog port - audit trail and dedup store for Stripe events.
//!
//! Every received event id gets exactly one row. Rows are never deleted and
//! are only mutated to flip `processed` or to record an error, so the log
//! doubles as the audit trail for billing state changes.
//!
//! Stripe delivers at least once, and may deliver the same event to several
//! invocations concurrently. Implementations must detect duplicates with the
//! store's uniqueness constraint on `event_id`, never with a read-then-write.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};

/// One received webhook event.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEventRecord {
    /// Stripe event ID (evt_xxx format).
    pub event_id: String,

    /// Type of Stripe event (e.g., "customer.subscription.updated").
    pub event_type: String,

    /// Event body as received, for audit and replay.
    pub payload: serde_json::Value,

    /// True once every handler for the event succeeded.
    pub processed: bool,

    /// Last processing error, cleared on success.
    pub error: Option<String>,

    pub received_at: Timestamp,

    pub processed_at: Option<Timestamp>,
}

impl WebhookEventRecord {
    /// Creates the unprocessed row written on first receipt.
    pub fn received(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            payload,
            processed: false,
            error: None,
            received_at: Timestamp::now(),
            processed_at: None,
        }
    }
}

/// Result of recording a received event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// First delivery of this event id.
    New,
    /// The event id was already logged. `processed` tells whether an earlier
    /// delivery completed.
    Duplicate { processed: bool },
}

/// Port for the webhook event log.
#[async_trait]
pub trait WebhookEventLog: Send + Sync {
    /// Inserts an unprocessed row, or reports the existing one.
    ///
    /// A duplicate is not an error.
    async fn record_received(
        &self,
        event_id: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<ReceiveOutcome, DomainError>;

    /// Sets processed = true and clears any earlier error.
    async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError>;

    /// Records a processing error. The row stays unprocessed so a redelivery retries it.
    async fn record_error(&self, event_id: &str, message: &str) -> Result<(), DomainError>;

    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;
}

/// Result of webhook processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookResult {
    /// Event was processed successfully.
    Processed,
    /// Event was already processed (idempotent skip).
    AlreadyProcessed,
}
