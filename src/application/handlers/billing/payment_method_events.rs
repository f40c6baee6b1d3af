//! `payment_method.attached` / `payment_method.updated`.

use async_trait::async_trait;

use crate::domain::billing::stripe_objects::StripePaymentMethod;
use crate::domain::billing::{StripeEvent, StripeEventType, UpdateOutcome, WebhookError};

use super::payment_method::snapshot_of;
use super::processor::WebhookEventHandler;
use super::BillingServices;

/// Updates the card brand and last four. Touches nothing else.
pub struct PaymentMethodHandler {
    services: BillingServices,
}

impl PaymentMethodHandler {
    pub fn new(services: BillingServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl WebhookEventHandler for PaymentMethodHandler {
    fn handles(&self) -> Vec<StripeEventType> {
        vec![
            StripeEventType::PaymentMethodAttached,
            StripeEventType::PaymentMethodUpdated,
        ]
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let pm: StripePaymentMethod = event.deserialize_object().map_err(|e| {
            WebhookError::MalformedPayload(format!("Invalid payment method: {}", e))
        })?;

        let Some(customer_id) = pm.customer_id() else {
            return Err(WebhookError::Ignored(format!(
                "Payment method {} is not attached to a customer",
                pm.id
            )));
        };
        let Some(snapshot) = snapshot_of(&pm) else {
            return Err(WebhookError::Ignored(format!(
                "Payment method {} is not a card",
                pm.id
            )));
        };

        let outcome = self
            .services
            .profiles
            .update_payment_method_by_customer(customer_id, &snapshot)
            .await?;
        if outcome == UpdateOutcome::NotFound {
            tracing::info!(
                event_id = %event.id,
                customer_id = %customer_id,
                "No profile for payment method customer"
            );
        }
        Ok(())
    }
}
