//! BillingProvider port - read-only enrichment lookups against Stripe.
//!
//! Used only to fill in details of an event already received; never to poll
//! for new events. Every call is fail-soft at the call site: a lookup error
//! is logged and the enrichment skipped.

use async_trait::async_trait;

use crate::domain::billing::stripe_objects::{
    StripeCustomer, StripeInvoice, StripePaymentMethod, StripePromotionCode, StripeSubscription,
};
use crate::domain::billing::WebhookError;

/// Lookups return `Ok(None)` when Stripe reports the object does not exist.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<StripeSubscription>, ProviderError>;

    /// Fetches an invoice with its payment intent expanded.
    async fn get_invoice(&self, invoice_id: &str) -> Result<Option<StripeInvoice>, ProviderError>;

    async fn get_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<Option<StripePaymentMethod>, ProviderError>;

    async fn get_customer(&self, customer_id: &str)
        -> Result<Option<StripeCustomer>, ProviderError>;

    async fn get_promotion_code(
        &self,
        promotion_code_id: &str,
    ) -> Result<Option<StripePromotionCode>, ProviderError>;
}

/// Error from a billing provider lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// Error code for categorization.
    pub code: ProviderErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimitExceeded, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::DecodeError, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ApiError, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ProviderError {}

impl From<ProviderError> for WebhookError {
    fn from(err: ProviderError) -> Self {
        WebhookError::UpstreamLookup(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorCode {
    NetworkError,
    AuthenticationError,
    RateLimitExceeded,
    DecodeError,
    ApiError,
}

impl ProviderErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderErrorCode::NetworkError | ProviderErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderErrorCode::NetworkError => "network_error",
            ProviderErrorCode::AuthenticationError => "authentication_error",
            ProviderErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            ProviderErrorCode::DecodeError => "decode_error",
            ProviderErrorCode::ApiError => "api_error",
        };
        write!(f, "{}", s)
    }
}
