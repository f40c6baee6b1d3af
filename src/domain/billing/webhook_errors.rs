//! Webhook error types for Stripe webhook handling.
//!
//! Every failure the reconciler can hit is one of these variants. Each
//! variant belongs to a [`WebhookErrorClass`], which decides the HTTP status
//! returned to Stripe and therefore whether Stripe redelivers.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors that occur during webhook processing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// Request arrived without a Stripe-Signature header.
    #[error("Missing Stripe-Signature header")]
    MissingSignature,

    /// No webhook signing secret is configured.
    #[error("Webhook signing secret is not configured")]
    MissingSecret,

    /// Signature header could not be parsed.
    #[error("Malformed signature header: {0}")]
    MalformedSignature(&'static str),

    /// No v1 signature in the header matches the payload.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed timestamp is older than the tolerance window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signed timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Test-mode event delivered to an endpoint that requires live mode.
    #[error("Test-mode event rejected by live endpoint")]
    LivemodeMismatch,

    /// Body is not a Stripe event, or the event object has the wrong shape.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Event was intentionally ignored (not an error condition).
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// A supplementary lookup against Stripe failed.
    #[error("Upstream lookup failed: {0}")]
    UpstreamLookup(String),

    /// No profile matches the event's customer or subscription.
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// A store write or read failed.
    #[error("Store write failed: {0}")]
    StoreWrite(String),
}

/// Coarse classification used for response mapping and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookErrorClass {
    ConfigurationOrRequest,
    InvalidSignature,
    MalformedPayload,
    UnknownEventType,
    UpstreamLookupFailure,
    StoreWriteFailure,
}

impl WebhookError {
    pub fn class(&self) -> WebhookErrorClass {
        match self {
            WebhookError::MissingSignature | WebhookError::MissingSecret => {
                WebhookErrorClass::ConfigurationOrRequest
            }
            WebhookError::MalformedSignature(_)
            | WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp
            | WebhookError::LivemodeMismatch => WebhookErrorClass::InvalidSignature,
            WebhookError::MalformedPayload(_) => WebhookErrorClass::MalformedPayload,
            WebhookError::Ignored(_) => WebhookErrorClass::UnknownEventType,
            WebhookError::UpstreamLookup(_) => WebhookErrorClass::UpstreamLookupFailure,
            WebhookError::ProfileNotFound(_) | WebhookError::StoreWrite(_) => {
                WebhookErrorClass::StoreWriteFailure
            }
        }
    }

    /// Returns true if Stripe should retry delivering this webhook.
    ///
    /// A missing secret is an operator error that a redeploy fixes, so the
    /// event is left for redelivery rather than dropped.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::MissingSecret
                | WebhookError::UpstreamLookup(_)
                | WebhookError::ProfileNotFound(_)
                | WebhookError::StoreWrite(_)
        )
    }

    /// Maps the error to an appropriate HTTP status code.
    ///
    /// - 2xx: Event acknowledged, no retry
    /// - 4xx: Client error, no retry
    /// - 5xx: Server error, will retry
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::Ignored(_) => StatusCode::OK,

            WebhookError::MissingSignature
            | WebhookError::MalformedSignature(_)
            | WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp
            | WebhookError::LivemodeMismatch
            | WebhookError::MalformedPayload(_) => StatusCode::BAD_REQUEST,

            WebhookError::MissingSecret
            | WebhookError::UpstreamLookup(_)
            | WebhookError::ProfileNotFound(_)
            | WebhookError::StoreWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ProfileNotFound => WebhookError::ProfileNotFound(err.message),
            _ => WebhookError::StoreWrite(err.to_string()),
        }
    }
}
