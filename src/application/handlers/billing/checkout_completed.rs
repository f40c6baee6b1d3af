//! `checkout.session.completed`.

use async_trait::async_trait;

use crate::domain::billing::stripe_objects::{
    Expandable, PromoReference, StripeCheckoutSession, StripeSubscription,
};
use crate::domain::billing::{
    PromoAttribution, StripeEvent, StripeEventType, UpdateOutcome, WebhookError,
};
use crate::domain::foundation::UserId;

use super::processor::WebhookEventHandler;
use super::promo_tracker::PromoTracker;
use super::subscription_sync::SubscriptionSyncer;
use super::BillingServices;

/// Links the buyer, syncs the new subscription and attributes the promo code.
pub struct CheckoutCompletedHandler {
    services: BillingServices,
}

impl CheckoutCompletedHandler {
    pub fn new(services: BillingServices) -> Self {
        Self { services }
    }

    /// The session's subscription, fetched when only its id is present.
    async fn subscription(&self, session: &StripeCheckoutSession) -> Option<StripeSubscription> {
        match session.subscription.as_ref()? {
            Expandable::Object(sub) => Some(sub.as_ref().clone()),
            Expandable::Id(id) => match self.services.provider.get_subscription(id).await {
                Ok(sub) => sub,
                Err(err) => {
                    tracing::warn!(
                        session_id = %session.id,
                        subscription_id = %id,
                        error = %err,
                        "Subscription lookup failed, relying on subscription events"
                    );
                    None
                }
            },
        }
    }

    async fn find_user(
        &self,
        customer_id: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserId>, WebhookError> {
        let profiles = &self.services.profiles;
        if let Some(customer_id) = customer_id {
            if let Some(profile) = profiles.find_by_customer_id(customer_id).await? {
                return Ok(Some(profile.user_id));
            }
        }
        if let Some(email) = email {
            if let Some(profile) = profiles.find_by_email(email).await? {
                return Ok(Some(profile.user_id));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl WebhookEventHandler for CheckoutCompletedHandler {
    fn handles(&self) -> Vec<StripeEventType> {
        vec![StripeEventType::CheckoutSessionCompleted]
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let session: StripeCheckoutSession = event.deserialize_object().map_err(|e| {
            WebhookError::MalformedPayload(format!("Invalid checkout session: {}", e))
        })?;
        let email = session.buyer_email();
        let customer_id = session.customer_id();

        if let (Some(email), Some(customer_id)) = (email, customer_id) {
            let linked = self
                .services
                .profiles
                .link_customer_by_email(email, customer_id)
                .await?;
            if linked == UpdateOutcome::NotFound {
                tracing::warn!(
                    event_id = %event.id,
                    session_id = %session.id,
                    customer_id = %customer_id,
                    "No profile for checkout email"
                );
            }
        }

        let mut user_id = None;
        let mut price_amount = None;
        if let Some(subscription) = self.subscription(&session).await {
            let synced = SubscriptionSyncer::new(&self.services)
                .sync(&subscription, event.occurred_at())
                .await?;
            user_id = synced.user_id;
            price_amount = synced.price_amount;
        }

        let Some(reference) = session.promo_reference() else {
            return Ok(());
        };

        let user_id = match user_id {
            Some(user_id) => user_id,
            None => match self.find_user(customer_id, email).await? {
                Some(user_id) => user_id,
                None => {
                    return Err(WebhookError::ProfileNotFound(format!(
                        "No profile for checkout session {}",
                        session.id
                    )));
                }
            },
        };

        let attribution = match &reference {
            PromoReference::PromotionId(id) => PromoAttribution {
                code: None,
                stripe_promotion_code_id: Some(id.clone()),
            },
            PromoReference::Code(code) => PromoAttribution {
                code: Some(code.clone()),
                stripe_promotion_code_id: None,
            },
        };
        self.services
            .profiles
            .set_promo_attribution(&user_id, &attribution)
            .await?;

        let revenue = session
            .amount_total
            .filter(|amount| *amount > 0)
            .or(price_amount);
        PromoTracker::new(&self.services)
            .track_conversion(&reference, &user_id, revenue, event.occurred_at())
            .await?;

        Ok(())
    }
}
