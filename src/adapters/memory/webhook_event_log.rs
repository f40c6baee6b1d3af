//! In-memory webhook event log.
//!
//! Each conditional write runs under a single write-lock acquisition, which
//! gives it the same all-or-nothing behaviour as the PostgreSQL statement.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{ReceiveOutcome, WebhookEventLog, WebhookEventRecord};

#[derive(Clone, Default)]
pub struct InMemoryWebhookEventLog {
    records: Arc<RwLock<HashMap<String, WebhookEventRecord>>>,
}

impl InMemoryWebhookEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of logged events.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn not_found(event_id: &str) -> DomainError {
    DomainError::new(
        ErrorCode::EventNotFound,
        format!("Webhook event {} was never recorded", event_id),
    )
}

#[async_trait]
impl WebhookEventLog for InMemoryWebhookEventLog {
    async fn record_received(
        &self,
        event_id: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<ReceiveOutcome, DomainError> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(event_id) {
            return Ok(ReceiveOutcome::Duplicate {
                processed: existing.processed,
            });
        }
        records.insert(
            event_id.to_string(),
            WebhookEventRecord::received(event_id, event_type, payload.clone()),
        );
        Ok(ReceiveOutcome::New)
    }

    async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(event_id).ok_or_else(|| not_found(event_id))?;
        record.processed = true;
        record.error = None;
        record.processed_at = Some(Timestamp::now());
        Ok(())
    }

    async fn record_error(&self, event_id: &str, message: &str) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(event_id).ok_or_else(|| not_found(event_id))?;
        record.error = Some(message.to_string());
        Ok(())
    }

    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        Ok(self.records.read().await.get(event_id).cloned())
    }
}
