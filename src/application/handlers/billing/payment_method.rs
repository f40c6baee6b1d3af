//! Best-effort card snapshot resolution.
//!
//! Every lookup here is fail-soft: a provider error or a non-card payment
//! method yields `None` and the caller carries on without a snapshot.

use crate::domain::billing::stripe_objects::{
    Expandable, StripeInvoice, StripePaymentMethod, StripeSubscription,
};
use crate::domain::billing::PaymentMethodSnapshot;
use crate::ports::BillingProvider;

pub struct PaymentMethodResolver<'a> {
    provider: &'a dyn BillingProvider,
}

impl<'a> PaymentMethodResolver<'a> {
    pub fn new(provider: &'a dyn BillingProvider) -> Self {
        Self { provider }
    }

    /// Card on the subscription's default payment method, else the one that
    /// paid its latest invoice.
    pub async fn for_subscription(
        &self,
        subscription: &StripeSubscription,
    ) -> Option<PaymentMethodSnapshot> {
        if let Some(pm) = &subscription.default_payment_method {
            if let Some(snapshot) = self.resolve(pm).await {
                return Some(snapshot);
            }
        }

        match &subscription.latest_invoice {
            Some(Expandable::Object(invoice)) => self.for_invoice(invoice).await,
            Some(Expandable::Id(invoice_id)) => self.for_invoice_id(invoice_id).await,
            None => None,
        }
    }

    /// Card that paid the invoice, fetching the invoice when its payment
    /// intent is not expanded.
    pub async fn for_invoice(&self, invoice: &StripeInvoice) -> Option<PaymentMethodSnapshot> {
        if let Some(pm) = invoice.payment_method() {
            return self.resolve(pm).await;
        }
        invoice.payment_intent.as_ref()?;
        self.for_invoice_id(&invoice.id).await
    }

    async fn for_invoice_id(&self, invoice_id: &str) -> Option<PaymentMethodSnapshot> {
        let invoice = match self.provider.get_invoice(invoice_id).await {
            Ok(Some(invoice)) => invoice,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(
                    invoice_id = %invoice_id,
                    error = %err,
                    "Invoice lookup failed, skipping card snapshot"
                );
                return None;
            }
        };
        match invoice.payment_method() {
            Some(pm) => self.resolve(pm).await,
            None => None,
        }
    }

    async fn resolve(
        &self,
        pm: &Expandable<StripePaymentMethod>,
    ) -> Option<PaymentMethodSnapshot> {
        match pm {
            Expandable::Object(pm) => snapshot_of(pm),
            Expandable::Id(id) => match self.provider.get_payment_method(id).await {
                Ok(Some(pm)) => snapshot_of(&pm),
                Ok(None) => None,
                Err(err) => {
                    tracing::warn!(
                        payment_method_id = %id,
                        error = %err,
                        "Payment method lookup failed, skipping card snapshot"
                    );
                    None
                }
            },
        }
    }
}

/// Brand and last four of a card payment method.
pub fn snapshot_of(pm: &StripePaymentMethod) -> Option<PaymentMethodSnapshot> {
    pm.card.as_ref().map(|card| PaymentMethodSnapshot {
        brand: card.brand.clone(),
        last4: card.last4.clone(),
    })
}
