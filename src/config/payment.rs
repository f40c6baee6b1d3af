//! Payment configuration

use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::stripe::{StripeConfig, DEFAULT_API_BASE_URL};
use crate::domain::billing::{Plan, PriceTable, StripeWebhookVerifier, DEFAULT_TOLERANCE_SECS};

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key, used for read-only lookups
    pub stripe_api_key: String,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Timeout for each Stripe lookup, in seconds
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,

    /// Reject events whose `livemode` flag is false
    #[serde(default)]
    pub require_livemode: bool,

    /// Maximum age of a signed webhook, in seconds. Zero disables the check.
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: i64,

    #[serde(default)]
    pub monthly_price_ids: Vec<String>,

    #[serde(default)]
    pub annual_price_ids: Vec<String>,

    /// Plan for price ids in neither list
    #[serde(default = "default_fallback_plan")]
    pub fallback_plan: Plan,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_") || self.stripe_api_key.starts_with("rk_test_")
    }

    pub fn price_table(&self) -> PriceTable {
        PriceTable::new(
            self.monthly_price_ids.iter().cloned(),
            self.annual_price_ids.iter().cloned(),
            self.fallback_plan,
        )
    }

    pub fn verifier(&self) -> StripeWebhookVerifier {
        StripeWebhookVerifier::new(self.stripe_webhook_secret.clone())
            .with_tolerance(self.signature_tolerance_secs)
            .with_require_livemode(self.require_livemode)
    }

    pub fn stripe_config(&self) -> StripeConfig {
        StripeConfig::new(self.stripe_api_key.clone())
            .with_base_url(self.api_base_url.clone())
            .with_timeout(Duration::from_secs(self.lookup_timeout_secs))
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_WEBHOOK_SECRET"));
        }

        // Secret and restricted keys only; publishable keys cannot read subscriptions.
        if !self.stripe_api_key.starts_with("sk_") && !self.stripe_api_key.starts_with("rk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if !self.api_base_url.starts_with("https://") && !self.api_base_url.starts_with("http://") {
            return Err(ValidationError::InvalidApiBaseUrl);
        }
        if self.lookup_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.signature_tolerance_secs < 0 {
            return Err(ValidationError::InvalidSignatureTolerance);
        }

        let monthly: HashSet<&str> = self.monthly_price_ids.iter().map(String::as_str).collect();
        if let Some(both) = self
            .annual_price_ids
            .iter()
            .find(|id| monthly.contains(id.as_str()))
        {
            return Err(ValidationError::AmbiguousPriceId(both.clone()));
        }

        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            api_base_url: default_api_base_url(),
            lookup_timeout_secs: default_lookup_timeout(),
            require_livemode: false,
            signature_tolerance_secs: default_signature_tolerance(),
            monthly_price_ids: Vec::new(),
            annual_price_ids: Vec::new(),
            fallback_plan: default_fallback_plan(),
        }
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_lookup_timeout() -> u64 {
    10
}

fn default_signature_tolerance() -> i64 {
    DEFAULT_TOLERANCE_SECS
}

fn default_fallback_plan() -> Plan {
    Plan::PremiumMonthly
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PaymentConfig {
        PaymentConfig {
            stripe_api_key: "sk_test_abcd1234".to_string(),
            stripe_webhook_secret: "whsec_xyz789".to_string(),
            monthly_price_ids: vec!["price_monthly".to_string()],
            annual_price_ids: vec!["price_annual".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(valid().validate().is_ok());
        assert!(valid().is_test_mode());
    }

    #[test]
    fn test_validation_missing_api_key() {
        assert_eq!(
            PaymentConfig::default().validate(),
            Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"))
        );
    }

    #[test]
    fn test_validation_missing_webhook_secret() {
        let config = PaymentConfig {
            stripe_webhook_secret: String::new(),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_publishable_key_rejected() {
        let config = PaymentConfig {
            stripe_api_key: "pk_test_xxx".to_string(),
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidStripeKey));
    }

    #[test]
    fn test_validation_restricted_key_accepted() {
        let config = PaymentConfig {
            stripe_api_key: "rk_live_xxx".to_string(),
            ..valid()
        };
        assert!(config.validate().is_ok());
        assert!(!config.is_test_mode());
    }

    #[test]
    fn test_validation_invalid_webhook_secret_prefix() {
        let config = PaymentConfig {
            stripe_webhook_secret: "secret_xxx".to_string(),
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidStripeWebhookSecret));
    }

    #[test]
    fn test_validation_negative_tolerance() {
        let config = PaymentConfig {
            signature_tolerance_secs: -1,
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidSignatureTolerance));
    }

    #[test]
    fn test_validation_price_in_both_lists() {
        let config = PaymentConfig {
            annual_price_ids: vec!["price_monthly".to_string()],
            ..valid()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::AmbiguousPriceId("price_monthly".to_string()))
        );
    }

    #[test]
    fn test_price_table_uses_configured_lists() {
        let table = valid().price_table();
        assert_eq!(table.plan_for(Some("price_annual")), Plan::PremiumAnnual);
        assert_eq!(table.plan_for(Some("price_monthly")), Plan::PremiumMonthly);
        assert_eq!(table.fallback(), Plan::PremiumMonthly);
    }

    #[test]
    fn test_stripe_config_keeps_base_url() {
        let config = PaymentConfig {
            api_base_url: "http://127.0.0.1:12111/".to_string(),
            ..valid()
        };
        assert_eq!(config.stripe_config().api_base_url(), "http://127.0.0.1:12111");
    }
}
