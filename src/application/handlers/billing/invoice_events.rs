//! `invoice.payment_succeeded` / `invoice.payment_failed`.

use async_trait::async_trait;

use crate::domain::billing::stripe_objects::StripeInvoice;
use crate::domain::billing::{
    LocalStatus, Milestone, StripeEvent, StripeEventType, UpdateOutcome, WebhookError,
};
use crate::domain::foundation::Timestamp;

use super::payment_method::PaymentMethodResolver;
use super::processor::WebhookEventHandler;
use super::promo_tracker::PromoTracker;
use super::subscription_sync::SubscriptionSyncer;
use super::BillingServices;

/// Subscription invoice carried by an event. One-off invoices are ignored.
fn parse_invoice(event: &StripeEvent) -> Result<(StripeInvoice, String), WebhookError> {
    let invoice: StripeInvoice = event
        .deserialize_object()
        .map_err(|e| WebhookError::MalformedPayload(format!("Invalid invoice: {}", e)))?;
    let Some(subscription_id) = invoice.subscription_id().map(str::to_string) else {
        return Err(WebhookError::Ignored(format!(
            "Invoice {} has no subscription",
            invoice.id
        )));
    };
    Ok((invoice, subscription_id))
}

/// Writes the invoice-driven status. A subscription no profile carries yet
/// is fetched and synced first. One the customer has since replaced or
/// deleted is left alone.
async fn apply_status(
    services: &BillingServices,
    subscription_id: &str,
    status: LocalStatus,
    occurred_at: Timestamp,
) -> Result<UpdateOutcome, WebhookError> {
    let profiles = &services.profiles;
    let outcome = profiles
        .set_status_by_subscription(subscription_id, status)
        .await?;
    if outcome != UpdateOutcome::NotFound {
        return Ok(outcome);
    }

    let subscription = match services.provider.get_subscription(subscription_id).await {
        Ok(subscription) => subscription,
        Err(err) => {
            tracing::warn!(
                subscription_id = %subscription_id,
                error = %err,
                "Subscription lookup failed"
            );
            None
        }
    };
    if let Some(subscription) = subscription {
        let synced = SubscriptionSyncer::new(services)
            .sync(&subscription, occurred_at)
            .await?;
        if matches!(
            synced.outcome,
            UpdateOutcome::SkippedEnded | UpdateOutcome::SkippedStale
        ) {
            return Ok(synced.outcome);
        }
    }

    match profiles
        .set_status_by_subscription(subscription_id, status)
        .await?
    {
        UpdateOutcome::NotFound => Err(WebhookError::ProfileNotFound(format!(
            "No profile for subscription {}",
            subscription_id
        ))),
        outcome => Ok(outcome),
    }
}

/// Refreshes the card snapshot. Failures are logged only.
async fn refresh_card(services: &BillingServices, invoice: &StripeInvoice) {
    let Some(customer_id) = invoice.customer_id() else {
        return;
    };
    let Some(snapshot) = PaymentMethodResolver::new(services.provider.as_ref())
        .for_invoice(invoice)
        .await
    else {
        return;
    };
    if let Err(err) = services
        .profiles
        .update_payment_method_by_customer(customer_id, &snapshot)
        .await
    {
        tracing::warn!(
            customer_id = %customer_id,
            error = %err,
            "Failed to refresh card snapshot"
        );
    }
}

/// Activates the profile and checks retention milestones.
pub struct PaymentSucceededHandler {
    services: BillingServices,
}

impl PaymentSucceededHandler {
    pub fn new(services: BillingServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl WebhookEventHandler for PaymentSucceededHandler {
    fn handles(&self) -> Vec<StripeEventType> {
        vec![StripeEventType::InvoicePaymentSucceeded]
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let (invoice, subscription_id) = parse_invoice(event)?;
        let at = event.occurred_at();

        refresh_card(&self.services, &invoice).await;

        let status = self.services.mapper.on_payment_succeeded();
        let outcome = apply_status(&self.services, &subscription_id, status, at).await?;
        if outcome != UpdateOutcome::Applied {
            tracing::info!(
                event_id = %event.id,
                subscription_id = %subscription_id,
                outcome = ?outcome,
                "Ignoring payment for ended or replaced subscription"
            );
            return Ok(());
        }

        let Some(profile) = self
            .services
            .profiles
            .find_by_subscription_id(&subscription_id)
            .await?
        else {
            return Ok(());
        };

        tracing::info!(
            event_id = %event.id,
            user_id = %profile.user_id,
            subscription_id = %subscription_id,
            amount_paid = invoice.amount_paid,
            "Invoice paid"
        );

        self.services
            .promo_codes
            .mark_first_payment(&profile.user_id, at)
            .await?;

        let months = at.whole_months_since(&profile.created_at);
        let tracker = PromoTracker::new(&self.services);
        for milestone in Milestone::RETENTION {
            if months >= milestone.months_required() {
                tracker.check_milestone(&profile.user_id, milestone, at).await?;
            }
        }
        Ok(())
    }
}

/// Applies the payment-failure status policy. No commission effects.
pub struct PaymentFailedHandler {
    services: BillingServices,
}

impl PaymentFailedHandler {
    pub fn new(services: BillingServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl WebhookEventHandler for PaymentFailedHandler {
    fn handles(&self) -> Vec<StripeEventType> {
        vec![StripeEventType::InvoicePaymentFailed]
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let (invoice, subscription_id) = parse_invoice(event)?;

        refresh_card(&self.services, &invoice).await;

        let status = self.services.mapper.on_payment_failed();
        let outcome =
            apply_status(&self.services, &subscription_id, status, event.occurred_at()).await?;
        tracing::warn!(
            event_id = %event.id,
            invoice_id = %invoice.id,
            subscription_id = %subscription_id,
            status = %status,
            outcome = ?outcome,
            "Invoice payment failed"
        );
        Ok(())
    }
}
