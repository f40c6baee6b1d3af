//! Stripe read-only API client.
//!
//! Implements the `BillingProvider` port against the Stripe REST API. Only
//! `GET` lookups are issued; the reconciler never creates or mutates
//! anything in Stripe.
//!
//! # Security
//!
//! - The secret API key is held as `secrecy::SecretString` and sent as the
//!   basic-auth username
//! - `Debug` output never contains the key

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;

use crate::domain::billing::stripe_objects::{
    StripeCustomer, StripeInvoice, StripePaymentMethod, StripePromotionCode, StripeSubscription,
};
use crate::ports::{BillingProvider, ProviderError};

/// Default Stripe API host.
pub const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API.
    api_base_url: String,

    /// Per-request timeout.
    timeout: Duration,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }
}

impl fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Stripe client implementing `BillingProvider`.
pub struct StripeClient {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Fetches `/v1/{path}`. A 404 is `Ok(None)`.
    async fn get_object<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, ProviderError> {
        let url = format!("{}/v1/{}", self.config.api_base_url, path);

        let response = self
            .http_client
            .get(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(
                path = %path,
                status = status.as_u16(),
                error = %error_text,
                "Stripe lookup failed"
            );
            return Err(error_for_status(status, error_text));
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| ProviderError::decode(format!("Failed to parse Stripe response: {}", e)))
    }
}

fn error_for_status(status: reqwest::StatusCode, body: String) -> ProviderError {
    let message = format!("Stripe API error ({}): {}", status.as_u16(), body);
    match status {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            ProviderError::authentication(message)
        }
        reqwest::StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(message),
        _ => ProviderError::api(message),
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<StripeSubscription>, ProviderError> {
        self.get_object(&format!("subscriptions/{}", subscription_id), &[])
            .await
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<Option<StripeInvoice>, ProviderError> {
        self.get_object(
            &format!("invoices/{}", invoice_id),
            &[("expand[]", "payment_intent")],
        )
        .await
    }

    async fn get_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<Option<StripePaymentMethod>, ProviderError> {
        self.get_object(&format!("payment_methods/{}", payment_method_id), &[])
            .await
    }

    async fn get_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<StripeCustomer>, ProviderError> {
        let customer: Option<StripeCustomer> = self
            .get_object(&format!("customers/{}", customer_id), &[])
            .await?;
        Ok(customer.filter(|c| !c.deleted))
    }

    async fn get_promotion_code(
        &self,
        promotion_code_id: &str,
    ) -> Result<Option<StripePromotionCode>, ProviderError> {
        self.get_object(&format!("promotion_codes/{}", promotion_code_id), &[])
            .await
    }
}
