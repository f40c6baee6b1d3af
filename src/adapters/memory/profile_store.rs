//! In-memory profile store.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::{
    CustomerProfile, LocalStatus, PaymentMethodSnapshot, PromoAttribution, SubscriptionEnd,
    SubscriptionSync, UpdateOutcome,
};
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::ProfileStore;

#[derive(Clone, Default)]
pub struct InMemoryProfileStore {
    profiles: Arc<RwLock<Vec<CustomerProfile>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a profile as signup would.
    pub async fn insert(&self, profile: CustomerProfile) {
        self.profiles.write().await.push(profile);
    }

    /// Applies `f` to the first profile matching `pred`, under one write lock.
    async fn update_where<P, F>(&self, pred: P, f: F) -> UpdateOutcome
    where
        P: Fn(&CustomerProfile) -> bool,
        F: FnOnce(&mut CustomerProfile) -> UpdateOutcome,
    {
        let mut profiles = self.profiles.write().await;
        match profiles.iter_mut().find(|p| pred(p)) {
            Some(profile) => f(profile),
            None => UpdateOutcome::NotFound,
        }
    }

    async fn find_where<P>(&self, pred: P) -> Option<CustomerProfile>
    where
        P: Fn(&CustomerProfile) -> bool,
    {
        self.profiles.read().await.iter().find(|p| pred(p)).cloned()
    }
}

fn has_customer(profile: &CustomerProfile, customer_id: &str) -> bool {
    profile.stripe_customer_id.as_deref() == Some(customer_id)
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<CustomerProfile>, DomainError> {
        Ok(self.find_where(|p| &p.user_id == user_id).await)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<CustomerProfile>, DomainError> {
        Ok(self.find_where(|p| p.email.eq_ignore_ascii_case(email)).await)
    }

    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<CustomerProfile>, DomainError> {
        Ok(self.find_where(|p| has_customer(p, customer_id)).await)
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<CustomerProfile>, DomainError> {
        Ok(self
            .find_where(|p| p.stripe_subscription_id.as_deref() == Some(subscription_id))
            .await)
    }

    async fn link_customer_by_email(
        &self,
        email: &str,
        customer_id: &str,
    ) -> Result<UpdateOutcome, DomainError> {
        Ok(self
            .update_where(
                |p| p.email.eq_ignore_ascii_case(email),
                |p| {
                    p.stripe_customer_id = Some(customer_id.to_string());
                    UpdateOutcome::Applied
                },
            )
            .await)
    }

    async fn apply_subscription(
        &self,
        sync: &SubscriptionSync,
    ) -> Result<UpdateOutcome, DomainError> {
        Ok(self
            .update_where(
                |p| has_customer(p, &sync.customer_id),
                |p| p.apply_subscription(sync),
            )
            .await)
    }

    async fn end_subscription(&self, end: &SubscriptionEnd) -> Result<UpdateOutcome, DomainError> {
        Ok(self
            .update_where(
                |p| has_customer(p, &end.customer_id),
                |p| p.end_subscription(end),
            )
            .await)
    }

    async fn set_status_by_subscription(
        &self,
        subscription_id: &str,
        status: LocalStatus,
    ) -> Result<UpdateOutcome, DomainError> {
        Ok(self
            .update_where(
                |p| p.stripe_subscription_id.as_deref() == Some(subscription_id),
                |p| p.apply_invoice_status(subscription_id, status),
            )
            .await)
    }

    async fn update_payment_method_by_customer(
        &self,
        customer_id: &str,
        snapshot: &PaymentMethodSnapshot,
    ) -> Result<UpdateOutcome, DomainError> {
        Ok(self
            .update_where(
                |p| has_customer(p, customer_id),
                |p| {
                    p.set_payment_method(snapshot);
                    UpdateOutcome::Applied
                },
            )
            .await)
    }

    async fn set_promo_attribution(
        &self,
        user_id: &UserId,
        attribution: &PromoAttribution,
    ) -> Result<UpdateOutcome, DomainError> {
        Ok(self
            .update_where(
                |p| &p.user_id == user_id,
                |p| {
                    p.attribute_promo(attribution);
                    UpdateOutcome::Applied
                },
            )
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::Plan;
    use crate::domain::foundation::Timestamp;

    async fn store_with_profile() -> (InMemoryProfileStore, UserId) {
        let store = InMemoryProfileStore::new();
        let user_id = UserId::new();
        store
            .insert(CustomerProfile::new(user_id, "Parent@Example.com", Timestamp::now()))
            .await;
        (store, user_id)
    }

    fn sync() -> SubscriptionSync {
        SubscriptionSync {
            customer_id: "cus_1".into(),
            subscription_id: "sub_1".into(),
            external_status: "active".into(),
            status: LocalStatus::Active,
            plan: Plan::PremiumMonthly,
            current_period_end: None,
            trial_end: None,
            cancel_at_period_end: false,
            expires_at: None,
            price_amount: Some(999),
            payment_method: None,
            occurred_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn link_matches_email_case_insensitively() {
        let (store, user_id) = store_with_profile().await;

        let outcome = store
            .link_customer_by_email("parent@example.com", "cus_1")
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::Applied);
        let profile = store.find_by_customer_id("cus_1").await.unwrap().unwrap();
        assert_eq!(profile.user_id, user_id);
    }

    #[tokio::test]
    async fn link_unknown_email_is_not_found() {
        let (store, _) = store_with_profile().await;
        let outcome = store
            .link_customer_by_email("nobody@example.com", "cus_1")
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn apply_requires_linked_customer() {
        let (store, _) = store_with_profile().await;
        assert_eq!(
            store.apply_subscription(&sync()).await.unwrap(),
            UpdateOutcome::NotFound
        );

        store
            .link_customer_by_email("parent@example.com", "cus_1")
            .await
            .unwrap();
        assert_eq!(
            store.apply_subscription(&sync()).await.unwrap(),
            UpdateOutcome::Applied
        );
        assert!(store.find_by_subscription_id("sub_1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn invoice_status_matches_by_subscription() {
        let (store, _) = store_with_profile().await;
        store
            .link_customer_by_email("parent@example.com", "cus_1")
            .await
            .unwrap();
        store.apply_subscription(&sync()).await.unwrap();

        let outcome = store
            .set_status_by_subscription("sub_1", LocalStatus::Expired)
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::Applied);
        let profile = store.find_by_subscription_id("sub_1").await.unwrap().unwrap();
        assert_eq!(profile.subscription_status, LocalStatus::Expired);
    }

    #[tokio::test]
    async fn deleted_subscription_id_blocks_later_writes() {
        let (store, _) = store_with_profile().await;
        store
            .link_customer_by_email("parent@example.com", "cus_1")
            .await
            .unwrap();
        store.apply_subscription(&sync()).await.unwrap();
        store
            .end_subscription(&SubscriptionEnd {
                customer_id: "cus_1".into(),
                subscription_id: "sub_1".into(),
                status: LocalStatus::Free,
                plan: Plan::Free,
                ended_at: Timestamp::now(),
            })
            .await
            .unwrap();

        assert_eq!(
            store.apply_subscription(&sync()).await.unwrap(),
            UpdateOutcome::SkippedEnded
        );
        assert_eq!(
            store
                .set_status_by_subscription("sub_1", LocalStatus::Active)
                .await
                .unwrap(),
            UpdateOutcome::SkippedEnded
        );
    }
}
