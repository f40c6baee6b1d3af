//! Customer profile billing fields and the conditional writes applied to them.
//!
//! The write rules live here so every store applies them identically. A store
//! runs each rule as a single atomic operation (one SQL statement, or one
//! critical section in memory).

use serde::{Deserialize, Serialize};

use super::{LocalStatus, Plan};
use crate::domain::foundation::{Timestamp, UserId};

/// Raw Stripe status recorded on a deleted subscription.
pub const CANCELED_STATUS: &str = "canceled";

/// Card brand and last four digits, captured opportunistically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodSnapshot {
    pub brand: String,
    pub last4: String,
}

/// One row per end user; only the billing fields are owned by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub user_id: UserId,
    pub email: String,
    pub stripe_customer_id: Option<String>,
    pub created_at: Timestamp,

    pub subscription_status: LocalStatus,
    pub subscription_plan: Plan,
    pub stripe_subscription_id: Option<String>,
    pub stripe_subscription_status: Option<String>,
    pub current_period_end: Option<Timestamp>,
    pub trial_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    /// Price at first subscription, minor units. Set once.
    pub locked_in_price: Option<i64>,
    pub expires_at: Option<Timestamp>,

    pub card_brand: Option<String>,
    pub card_last4: Option<String>,

    pub promo_code_used: Option<String>,
    pub stripe_promotion_code_id: Option<String>,

    /// Every subscription id this customer has had deleted. Never shrinks.
    pub ended_subscription_ids: Vec<String>,
    /// Event time of the latest subscription write.
    pub subscription_synced_at: Option<Timestamp>,
}

/// Subscription facts asserted by a subscription event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSync {
    pub customer_id: String,
    pub subscription_id: String,
    pub external_status: String,
    pub status: LocalStatus,
    pub plan: Plan,
    pub current_period_end: Option<Timestamp>,
    pub trial_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub expires_at: Option<Timestamp>,
    pub price_amount: Option<i64>,
    pub payment_method: Option<PaymentMethodSnapshot>,
    /// Event time the facts were observed at.
    pub occurred_at: Timestamp,
}

/// Facts asserted by `customer.subscription.deleted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionEnd {
    pub customer_id: String,
    pub subscription_id: String,
    pub status: LocalStatus,
    pub plan: Plan,
    pub ended_at: Timestamp,
}

/// Promo attribution recorded at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoAttribution {
    pub code: Option<String>,
    pub stripe_promotion_code_id: Option<String>,
}

/// Result of a conditional profile write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// No profile matched the key.
    NotFound,
    /// The subscription was already deleted; the write would resurrect it.
    SkippedEnded,
    /// The profile has moved on to a different, newer subscription.
    SkippedStale,
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied)
    }
}

impl CustomerProfile {
    /// Creates a free profile at signup.
    pub fn new(user_id: UserId, email: impl Into<String>, created_at: Timestamp) -> Self {
        Self {
            user_id,
            email: email.into(),
            stripe_customer_id: None,
            created_at,
            subscription_status: LocalStatus::Free,
            subscription_plan: Plan::Free,
            stripe_subscription_id: None,
            stripe_subscription_status: None,
            current_period_end: None,
            trial_end: None,
            cancel_at_period_end: false,
            locked_in_price: None,
            expires_at: None,
            card_brand: None,
            card_last4: None,
            promo_code_used: None,
            stripe_promotion_code_id: None,
            ended_subscription_ids: Vec::new(),
            subscription_synced_at: None,
        }
    }

    /// True when `subscription_id` was ever deleted for this customer.
    pub fn is_ended(&self, subscription_id: &str) -> bool {
        self.ended_subscription_ids.iter().any(|id| id == subscription_id)
    }

    fn is_on_other_subscription(&self, subscription_id: &str) -> bool {
        matches!(self.stripe_subscription_id.as_deref(), Some(current) if current != subscription_id)
    }

    fn is_older_than_last_sync(&self, occurred_at: Timestamp) -> bool {
        matches!(self.subscription_synced_at, Some(last) if occurred_at < last)
    }

    fn record_sync_time(&mut self, occurred_at: Timestamp) {
        self.subscription_synced_at = Some(match self.subscription_synced_at {
            Some(last) => last.max(occurred_at),
            None => occurred_at,
        });
    }

    /// Applies a subscription upsert unless it would resurrect a deleted
    /// subscription.
    ///
    /// A different subscription replaces the current one only when it grants
    /// access and was observed no earlier than the last subscription write.
    pub fn apply_subscription(&mut self, sync: &SubscriptionSync) -> UpdateOutcome {
        if self.is_ended(&sync.subscription_id) {
            return UpdateOutcome::SkippedEnded;
        }
        if self.is_on_other_subscription(&sync.subscription_id)
            && (!sync.status.has_access() || self.is_older_than_last_sync(sync.occurred_at))
        {
            return UpdateOutcome::SkippedStale;
        }

        self.stripe_customer_id = Some(sync.customer_id.clone());
        self.stripe_subscription_id = Some(sync.subscription_id.clone());
        self.stripe_subscription_status = Some(sync.external_status.clone());
        self.subscription_status = sync.status;
        self.subscription_plan = sync.plan;
        self.current_period_end = sync.current_period_end;
        self.trial_end = sync.trial_end;
        self.cancel_at_period_end = sync.cancel_at_period_end;
        self.expires_at = sync.expires_at;
        if self.locked_in_price.is_none() {
            self.locked_in_price = sync.price_amount;
        }
        if let Some(pm) = &sync.payment_method {
            self.set_payment_method(pm);
        }
        self.record_sync_time(sync.occurred_at);
        UpdateOutcome::Applied
    }

    /// Tombstones the subscription id. A deletion for a subscription the
    /// profile has already replaced leaves the current fields alone.
    pub fn end_subscription(&mut self, end: &SubscriptionEnd) -> UpdateOutcome {
        if !self.is_ended(&end.subscription_id) {
            self.ended_subscription_ids.push(end.subscription_id.clone());
        }
        if self.is_on_other_subscription(&end.subscription_id) {
            return UpdateOutcome::SkippedStale;
        }

        self.stripe_subscription_id = Some(end.subscription_id.clone());
        self.stripe_subscription_status = Some(CANCELED_STATUS.to_string());
        self.subscription_status = end.status;
        self.subscription_plan = end.plan;
        self.current_period_end = None;
        self.trial_end = None;
        self.cancel_at_period_end = false;
        self.expires_at = Some(end.ended_at);
        self.record_sync_time(end.ended_at);
        UpdateOutcome::Applied
    }

    /// Sets the local status from an invoice event unless the subscription was deleted.
    pub fn apply_invoice_status(&mut self, subscription_id: &str, status: LocalStatus) -> UpdateOutcome {
        if self.is_ended(subscription_id) {
            return UpdateOutcome::SkippedEnded;
        }
        self.subscription_status = status;
        UpdateOutcome::Applied
    }

    pub fn set_payment_method(&mut self, pm: &PaymentMethodSnapshot) {
        self.card_brand = Some(pm.brand.clone());
        self.card_last4 = Some(pm.last4.clone());
    }

    /// Records promo attribution without overwriting an earlier one.
    pub fn attribute_promo(&mut self, attribution: &PromoAttribution) {
        if self.promo_code_used.is_none() {
            self.promo_code_used = attribution.code.clone();
        }
        if self.stripe_promotion_code_id.is_none() {
            self.stripe_promotion_code_id = attribution.stripe_promotion_code_id.clone();
        }
    }
}
