//! PostgreSQL implementation of WebhookEventLog.
//!
//! Duplicate detection rides on the `webhook_events` primary key. A single
//! statement inserts the row or reports the existing one, so two concurrent
//! deliveries of the same event can never both see `New`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{ReceiveOutcome, WebhookEventLog, WebhookEventRecord};

/// PostgreSQL implementation of the WebhookEventLog port.
#[derive(Clone)]
pub struct PostgresWebhookEventLog {
    pool: PgPool,
}

impl PostgresWebhookEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    event_id: String,
    event_type: String,
    payload: serde_json::Value,
    processed: bool,
    error: Option<String>,
    received_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl From<WebhookEventRow> for WebhookEventRecord {
    fn from(row: WebhookEventRow) -> Self {
        Self {
            event_id: row.event_id,
            event_type: row.event_type,
            payload: row.payload,
            processed: row.processed,
            error: row.error,
            received_at: Timestamp::from_datetime(row.received_at),
            processed_at: row.processed_at.map(Timestamp::from_datetime),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReceiveRow {
    inserted: bool,
    processed: bool,
}

fn not_found(event_id: &str) -> DomainError {
    DomainError::new(
        ErrorCode::EventNotFound,
        format!("Webhook event not found: {}", event_id),
    )
}

#[async_trait]
impl WebhookEventLog for PostgresWebhookEventLog {
    async fn record_received(
        &self,
        event_id: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<ReceiveOutcome, DomainError> {
        let row: Option<ReceiveRow> = sqlx::query_as(
            r#"
            WITH inserted AS (
                INSERT INTO webhook_events (event_id, event_type, payload, processed, received_at)
                VALUES ($1, $2, $3, FALSE, now())
                ON CONFLICT (event_id) DO NOTHING
                RETURNING processed
            )
            SELECT TRUE AS inserted, processed FROM inserted
            UNION ALL
            SELECT FALSE AS inserted, processed FROM webhook_events
            WHERE event_id = $1 AND NOT EXISTS (SELECT 1 FROM inserted)
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .bind(payload)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to record webhook event", e))?;

        // No row at all: a concurrent transaction holds the insert and has
        // not committed yet. Treat it as an in-flight duplicate.
        Ok(match row {
            Some(ReceiveRow { inserted: true, .. }) => ReceiveOutcome::New,
            Some(ReceiveRow { processed, .. }) => ReceiveOutcome::Duplicate { processed },
            None => ReceiveOutcome::Duplicate { processed: false },
        })
    }

    async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events
            SET processed = TRUE, error = NULL, processed_at = now()
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to mark webhook event processed", e))?;

        if result.rows_affected() == 0 {
            return Err(not_found(event_id));
        }
        Ok(())
    }

    async fn record_error(&self, event_id: &str, message: &str) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events
            SET error = $2
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(message)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to record webhook error", e))?;

        if result.rows_affected() == 0 {
            return Err(not_found(event_id));
        }
        Ok(())
    }

    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(
            r#"
            SELECT event_id, event_type, payload, processed, error, received_at, processed_at
            FROM webhook_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load webhook event", e))?;

        Ok(row.map(WebhookEventRecord::from))
    }
}
