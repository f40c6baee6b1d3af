//! `customer.created` / `customer.updated`.

use async_trait::async_trait;

use crate::domain::billing::stripe_objects::StripeCustomer;
use crate::domain::billing::{StripeEvent, StripeEventType, UpdateOutcome, WebhookError};

use super::processor::WebhookEventHandler;
use super::BillingServices;

/// Links the Stripe customer to the profile with the same email.
pub struct CustomerLinkHandler {
    services: BillingServices,
}

impl CustomerLinkHandler {
    pub fn new(services: BillingServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl WebhookEventHandler for CustomerLinkHandler {
    fn handles(&self) -> Vec<StripeEventType> {
        vec![
            StripeEventType::CustomerCreated,
            StripeEventType::CustomerUpdated,
        ]
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let customer: StripeCustomer = event
            .deserialize_object()
            .map_err(|e| WebhookError::MalformedPayload(format!("Invalid customer: {}", e)))?;

        let Some(email) = customer.email.as_deref() else {
            return Err(WebhookError::Ignored(format!(
                "Customer {} has no email",
                customer.id
            )));
        };

        match self
            .services
            .profiles
            .link_customer_by_email(email, &customer.id)
            .await?
        {
            UpdateOutcome::NotFound => {
                tracing::info!(
                    event_id = %event.id,
                    customer_id = %customer.id,
                    "No profile for customer email yet"
                );
            }
            _ => {
                tracing::info!(
                    event_id = %event.id,
                    customer_id = %customer.id,
                    "Customer linked to profile"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::*;
    use serde_json::json;

    #[tokio::test]
    async fn links_customer_by_email() {
        let h = Harness::new();
        let user = h.seed_profile("parent@example.com", None, JAN_1_2024).await;
        let handler = CustomerLinkHandler::new(h.services.clone());

        handler
            .handle(&event(
                "evt_1",
                "customer.created",
                json!({"id": "cus_1", "email": "Parent@Example.com"}),
                JAN_1_2024,
            ))
            .await
            .unwrap();

        assert_eq!(h.profile(&user).await.stripe_customer_id.as_deref(), Some("cus_1"));
    }

    #[tokio::test]
    async fn unknown_email_succeeds_without_write() {
        let h = Harness::new();
        let handler = CustomerLinkHandler::new(h.services.clone());

        let result = handler
            .handle(&event(
                "evt_1",
                "customer.updated",
                json!({"id": "cus_1", "email": "stranger@example.com"}),
                JAN_1_2024,
            ))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn customer_without_email_is_ignored() {
        let h = Harness::new();
        let handler = CustomerLinkHandler::new(h.services.clone());

        let result = handler
            .handle(&event("evt_1", "customer.created", json!({"id": "cus_1"}), JAN_1_2024))
            .await;

        assert!(matches!(result, Err(WebhookError::Ignored(_))));
    }
}
