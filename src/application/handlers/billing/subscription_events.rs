//! `customer.subscription.*` events.

use async_trait::async_trait;

use crate::domain::billing::stripe_objects::{PromoReference, StripeSubscription};
use crate::domain::billing::{
    StripeEvent, StripeEventType, SubscriptionEnd, UpdateOutcome, WebhookError,
};

use super::processor::WebhookEventHandler;
use super::promo_tracker::PromoTracker;
use super::subscription_sync::SubscriptionSyncer;
use super::BillingServices;

fn parse_subscription(event: &StripeEvent) -> Result<StripeSubscription, WebhookError> {
    event
        .deserialize_object()
        .map_err(|e| WebhookError::MalformedPayload(format!("Invalid subscription: {}", e)))
}

/// `customer.subscription.created` / `.updated`.
pub struct SubscriptionUpsertHandler {
    services: BillingServices,
}

impl SubscriptionUpsertHandler {
    pub fn new(services: BillingServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl WebhookEventHandler for SubscriptionUpsertHandler {
    fn handles(&self) -> Vec<StripeEventType> {
        vec![
            StripeEventType::CustomerSubscriptionCreated,
            StripeEventType::CustomerSubscriptionUpdated,
        ]
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let subscription = parse_subscription(event)?;
        let synced = SubscriptionSyncer::new(&self.services)
            .sync(&subscription, event.occurred_at())
            .await?;

        if synced.outcome != UpdateOutcome::Applied || !synced.status.has_access() {
            return Ok(());
        }
        let (Some(promotion_id), Some(user_id)) = (subscription.promotion_code_id(), synced.user_id)
        else {
            return Ok(());
        };

        PromoTracker::new(&self.services)
            .track_conversion(
                &PromoReference::PromotionId(promotion_id.to_string()),
                &user_id,
                synced.price_amount,
                event.occurred_at(),
            )
            .await?;
        Ok(())
    }
}

/// `customer.subscription.deleted`: tombstones the subscription and marks
/// promo usage churned.
pub struct SubscriptionDeletedHandler {
    services: BillingServices,
}

impl SubscriptionDeletedHandler {
    pub fn new(services: BillingServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl WebhookEventHandler for SubscriptionDeletedHandler {
    fn handles(&self) -> Vec<StripeEventType> {
        vec![StripeEventType::CustomerSubscriptionDeleted]
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let subscription = parse_subscription(event)?;
        let (status, plan) = self.services.mapper.on_subscription_deleted();
        let ended_at = event.occurred_at();
        let end = SubscriptionEnd {
            customer_id: subscription.customer_id().to_string(),
            subscription_id: subscription.id.clone(),
            status,
            plan,
            ended_at,
        };

        let profiles = &self.services.profiles;
        match profiles.end_subscription(&end).await? {
            UpdateOutcome::Applied => {}
            UpdateOutcome::NotFound => {
                tracing::info!(
                    event_id = %event.id,
                    customer_id = %end.customer_id,
                    subscription_id = %end.subscription_id,
                    "Deleted subscription belongs to no profile"
                );
                return Ok(());
            }
            outcome => {
                tracing::info!(
                    event_id = %event.id,
                    subscription_id = %end.subscription_id,
                    outcome = ?outcome,
                    "Ignoring stale subscription deletion"
                );
                return Ok(());
            }
        }

        tracing::info!(
            event_id = %event.id,
            customer_id = %end.customer_id,
            subscription_id = %end.subscription_id,
            "Subscription ended"
        );

        if let Some(profile) = profiles.find_by_customer_id(&end.customer_id).await? {
            let churned = self
                .services
                .promo_codes
                .mark_churned(&profile.user_id, ended_at)
                .await?;
            if churned > 0 {
                tracing::info!(user_id = %profile.user_id, churned, "Promo usage marked churned");
            }
        }
        Ok(())
    }
}

/// `customer.subscription.trial_will_end`: acknowledged only.
pub struct TrialWillEndHandler;

#[async_trait]
impl WebhookEventHandler for TrialWillEndHandler {
    fn handles(&self) -> Vec<StripeEventType> {
        vec![StripeEventType::CustomerSubscriptionTrialWillEnd]
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let subscription = parse_subscription(event)?;
        tracing::info!(
            event_id = %event.id,
            customer_id = %subscription.customer_id(),
            subscription_id = %subscription.id,
            trial_end = ?subscription.trial_end,
            "Trial ending soon"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::*;
    use crate::domain::billing::{LocalStatus, Plan, PromoTier, CANCELED_STATUS};
    use crate::domain::foundation::Timestamp;
    use crate::ports::{CommissionRepository, PromoCodeRepository};
    use serde_json::json;

    // ══════════════════════════════════════════════════════════════
    // Upsert
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn update_with_promotion_discount_tracks_conversion() {
        let h = Harness::new();
        let user = h.seed_profile("a@example.com", Some("cus_1"), JAN_1_2024).await;
        let code_id = h.seed_promo("BUMP10", "promo_1", PromoTier::Micro).await;
        let mut sub = subscription_json("sub_1", "cus_1", "active");
        sub["discount"] = json!({"promotion_code": "promo_1"});
        let handler = SubscriptionUpsertHandler::new(h.services.clone());

        handler
            .handle(&event("evt_1", "customer.subscription.created", sub.clone(), JAN_1_2024))
            .await
            .unwrap();
        handler
            .handle(&event("evt_2", "customer.subscription.updated", sub, JAN_1_2024 + 60))
            .await
            .unwrap();

        let code = h.promo_codes.find_by_id(&code_id).await.unwrap().unwrap();
        assert_eq!(code.usage_count, 1);
        let usage = h.promo_codes.find_usage_for_user(&user).await.unwrap().unwrap();
        assert_eq!(usage.subscription_started_at, Timestamp::from_unix(JAN_1_2024));
        assert_eq!(h.commissions.list_for_user(&user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ended_status_does_not_track_conversion() {
        let h = Harness::new();
        h.seed_profile("a@example.com", Some("cus_1"), JAN_1_2024).await;
        h.seed_promo("BUMP10", "promo_1", PromoTier::Micro).await;
        let mut sub = subscription_json("sub_1", "cus_1", "incomplete_expired");
        sub["discount"] = json!({"promotion_code": "promo_1"});
        let handler = SubscriptionUpsertHandler::new(h.services.clone());

        handler
            .handle(&event("evt_1", "customer.subscription.updated", sub, JAN_1_2024))
            .await
            .unwrap();

        assert!(h.commissions.is_empty().await);
    }

    #[tokio::test]
    async fn malformed_subscription_is_rejected() {
        let h = Harness::new();
        let handler = SubscriptionUpsertHandler::new(h.services.clone());

        let result = handler
            .handle(&event("evt_1", "customer.subscription.updated", json!({"id": 5}), JAN_1_2024))
            .await;

        assert!(matches!(result, Err(WebhookError::MalformedPayload(_))));
    }

    // ══════════════════════════════════════════════════════════════
    // Deletion
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn deletion_tombstones_and_churns() {
        let h = Harness::new();
        let user = h.seed_profile("a@example.com", Some("cus_1"), JAN_1_2024).await;
        h.seed_promo("BUMP10", "promo_1", PromoTier::Micro).await;
        let mut sub = subscription_json("sub_1", "cus_1", "active");
        sub["discount"] = json!({"promotion_code": "promo_1"});
        SubscriptionUpsertHandler::new(h.services.clone())
            .handle(&event("evt_1", "customer.subscription.created", sub, JAN_1_2024))
            .await
            .unwrap();

        let deleted_at = JAN_1_2024 + 10 * 86_400;
        SubscriptionDeletedHandler::new(h.services.clone())
            .handle(&event(
                "evt_2",
                "customer.subscription.deleted",
                subscription_json("sub_1", "cus_1", "canceled"),
                deleted_at,
            ))
            .await
            .unwrap();

        let profile = h.profile(&user).await;
        assert_eq!(profile.subscription_status, LocalStatus::Free);
        assert_eq!(profile.subscription_plan, Plan::Free);
        assert_eq!(profile.stripe_subscription_status.as_deref(), Some(CANCELED_STATUS));
        assert_eq!(profile.expires_at, Timestamp::from_unix(deleted_at));
        assert!(profile.current_period_end.is_none());
        let usage = h.promo_codes.find_usage_for_user(&user).await.unwrap().unwrap();
        assert_eq!(usage.churned_at, Timestamp::from_unix(deleted_at));
    }

    #[tokio::test]
    async fn stale_deletion_keeps_newer_subscription() {
        let h = Harness::new();
        let user = h.seed_profile("a@example.com", Some("cus_1"), JAN_1_2024).await;
        SubscriptionUpsertHandler::new(h.services.clone())
            .handle(&event(
                "evt_1",
                "customer.subscription.created",
                subscription_json("sub_new", "cus_1", "active"),
                JAN_1_2024,
            ))
            .await
            .unwrap();

        SubscriptionDeletedHandler::new(h.services.clone())
            .handle(&event(
                "evt_2",
                "customer.subscription.deleted",
                subscription_json("sub_old", "cus_1", "canceled"),
                JAN_1_2024 + 60,
            ))
            .await
            .unwrap();

        let profile = h.profile(&user).await;
        assert_eq!(profile.stripe_subscription_id.as_deref(), Some("sub_new"));
        assert_eq!(profile.subscription_status, LocalStatus::Active);
    }

    #[tokio::test]
    async fn deletion_for_unknown_customer_succeeds() {
        let h = Harness::new();
        let result = SubscriptionDeletedHandler::new(h.services.clone())
            .handle(&event(
                "evt_1",
                "customer.subscription.deleted",
                subscription_json("sub_1", "cus_missing", "canceled"),
                JAN_1_2024,
            ))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn trial_will_end_is_acknowledged() {
        let result = TrialWillEndHandler
            .handle(&event(
                "evt_1",
                "customer.subscription.trial_will_end",
                subscription_json("sub_1", "cus_1", "trialing"),
                JAN_1_2024,
            ))
            .await;
        assert!(result.is_ok());
    }
}
