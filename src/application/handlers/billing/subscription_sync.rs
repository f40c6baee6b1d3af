//! Subscription upsert shared by checkout and subscription events.

use crate::domain::billing::stripe_objects::StripeSubscription;
use crate::domain::billing::{LocalStatus, SubscriptionSync, UpdateOutcome, WebhookError};
use crate::domain::foundation::{Timestamp, UserId};

use super::payment_method::PaymentMethodResolver;
use super::BillingServices;

/// What a subscription upsert did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub outcome: UpdateOutcome,
    pub user_id: Option<UserId>,
    pub status: LocalStatus,
    pub price_amount: Option<i64>,
}

pub struct SubscriptionSyncer<'a> {
    services: &'a BillingServices,
}

impl<'a> SubscriptionSyncer<'a> {
    pub fn new(services: &'a BillingServices) -> Self {
        Self { services }
    }

    /// Builds the write asserted by a subscription object observed at `occurred_at`.
    pub async fn build(
        &self,
        subscription: &StripeSubscription,
        occurred_at: Timestamp,
    ) -> SubscriptionSync {
        let mapper = &self.services.mapper;
        let status = mapper.map_status(&subscription.status);
        let plan = mapper.map_plan(subscription.price_id(), status);
        let current_period_end = subscription.period_end().and_then(Timestamp::from_unix);
        let expires_at = if subscription.cancel_at_period_end {
            current_period_end
        } else {
            None
        };
        let payment_method = PaymentMethodResolver::new(self.services.provider.as_ref())
            .for_subscription(subscription)
            .await;

        SubscriptionSync {
            customer_id: subscription.customer_id().to_string(),
            subscription_id: subscription.id.clone(),
            external_status: subscription.status.clone(),
            status,
            plan,
            current_period_end,
            trial_end: subscription.trial_end.and_then(Timestamp::from_unix),
            cancel_at_period_end: subscription.cancel_at_period_end,
            expires_at,
            price_amount: subscription.price().and_then(|p| p.unit_amount),
            payment_method,
            occurred_at,
        }
    }

    /// Upserts the subscription onto the customer's profile.
    ///
    /// A customer not yet linked to a profile is linked through the email
    /// Stripe holds for it. A profile that still cannot be found is an error
    /// so Stripe redelivers once signup has caught up.
    pub async fn sync(
        &self,
        subscription: &StripeSubscription,
        occurred_at: Timestamp,
    ) -> Result<SyncOutcome, WebhookError> {
        let sync = self.build(subscription, occurred_at).await;
        let profiles = &self.services.profiles;

        let mut outcome = profiles.apply_subscription(&sync).await?;
        if outcome == UpdateOutcome::NotFound && self.link_by_provider_email(&sync.customer_id).await? {
            outcome = profiles.apply_subscription(&sync).await?;
        }

        match outcome {
            UpdateOutcome::Applied => {
                tracing::info!(
                    customer_id = %sync.customer_id,
                    subscription_id = %sync.subscription_id,
                    external_status = %sync.external_status,
                    status = %sync.status,
                    plan = %sync.plan,
                    "Subscription synced"
                );
            }
            UpdateOutcome::SkippedEnded => {
                tracing::info!(
                    customer_id = %sync.customer_id,
                    subscription_id = %sync.subscription_id,
                    "Ignoring update for deleted subscription"
                );
            }
            UpdateOutcome::SkippedStale => {
                tracing::info!(
                    customer_id = %sync.customer_id,
                    subscription_id = %sync.subscription_id,
                    "Ignoring subscription replaced by a newer one"
                );
            }
            UpdateOutcome::NotFound => {
                return Err(WebhookError::ProfileNotFound(format!(
                    "No profile for customer {}",
                    sync.customer_id
                )));
            }
        }

        let user_id = profiles
            .find_by_customer_id(&sync.customer_id)
            .await?
            .map(|p| p.user_id);

        Ok(SyncOutcome {
            outcome,
            user_id,
            status: sync.status,
            price_amount: sync.price_amount,
        })
    }

    /// Links the customer to a profile via the email Stripe has on file.
    async fn link_by_provider_email(&self, customer_id: &str) -> Result<bool, WebhookError> {
        let customer = match self.services.provider.get_customer(customer_id).await {
            Ok(customer) => customer,
            Err(err) => {
                tracing::warn!(
                    customer_id = %customer_id,
                    error = %err,
                    "Customer lookup failed"
                );
                return Ok(false);
            }
        };

        let Some(email) = customer.and_then(|c| c.email) else {
            return Ok(false);
        };

        let linked = self
            .services
            .profiles
            .link_customer_by_email(&email, customer_id)
            .await?;
        Ok(linked.is_applied())
    }
}
