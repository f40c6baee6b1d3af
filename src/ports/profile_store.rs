//! ProfileStore port - conditional reads and writes of customer profiles.
//!
//! Every write is a single conditional statement keyed by a unique column
//! (email, Stripe customer id, Stripe subscription id or user id). The
//! conditions themselves are defined on [`CustomerProfile`]; implementations
//! must apply them atomically so concurrent deliveries converge.

use async_trait::async_trait;

use crate::domain::billing::{
    CustomerProfile, LocalStatus, PaymentMethodSnapshot, PromoAttribution, SubscriptionEnd,
    SubscriptionSync, UpdateOutcome,
};
use crate::domain::foundation::{DomainError, UserId};

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_user_id(&self, user_id: &UserId)
        -> Result<Option<CustomerProfile>, DomainError>;

    /// Case-insensitive email match.
    async fn find_by_email(&self, email: &str) -> Result<Option<CustomerProfile>, DomainError>;

    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<CustomerProfile>, DomainError>;

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<CustomerProfile>, DomainError>;

    /// Associates a Stripe customer id with the profile matching `email`.
    async fn link_customer_by_email(
        &self,
        email: &str,
        customer_id: &str,
    ) -> Result<UpdateOutcome, DomainError>;

    /// Upserts subscription fields on the profile matching `sync.customer_id`.
    ///
    /// See [`CustomerProfile::apply_subscription`] for the guard.
    async fn apply_subscription(&self, sync: &SubscriptionSync)
        -> Result<UpdateOutcome, DomainError>;

    /// Tombstones the subscription on the profile matching `end.customer_id`.
    ///
    /// See [`CustomerProfile::end_subscription`] for the guard.
    async fn end_subscription(&self, end: &SubscriptionEnd) -> Result<UpdateOutcome, DomainError>;

    /// Sets the local status on the profile holding `subscription_id`,
    /// unless that subscription was deleted.
    async fn set_status_by_subscription(
        &self,
        subscription_id: &str,
        status: LocalStatus,
    ) -> Result<UpdateOutcome, DomainError>;

    /// Refreshes the card snapshot on the profile matching `customer_id`.
    async fn update_payment_method_by_customer(
        &self,
        customer_id: &str,
        snapshot: &PaymentMethodSnapshot,
    ) -> Result<UpdateOutcome, DomainError>;

    /// Records promo attribution, keeping any earlier attribution.
    async fn set_promo_attribution(
        &self,
        user_id: &UserId,
        attribution: &PromoAttribution,
    ) -> Result<UpdateOutcome, DomainError>;
}
