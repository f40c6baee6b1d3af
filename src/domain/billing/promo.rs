//! Promo code attribution records.

use serde::{Deserialize, Serialize};

use super::commission::{Milestone, PromoTier};
use crate::domain::foundation::{CommissionId, PromoCodeId, Timestamp, UserId};

/// A tracked influencer promo code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCode {
    pub id: PromoCodeId,
    /// Customer-facing code string, unique.
    pub code: String,
    /// Stripe promotion code id (promo_...), unique when present.
    pub stripe_promotion_code_id: Option<String>,
    pub tier: PromoTier,
    /// Number of distinct subscribers acquired through this code.
    pub usage_count: i64,
}

impl PromoCode {
    pub fn new(code: impl Into<String>, tier: PromoTier) -> Self {
        Self {
            id: PromoCodeId::new(),
            code: code.into(),
            stripe_promotion_code_id: None,
            tier,
            usage_count: 0,
        }
    }

    pub fn with_stripe_id(mut self, stripe_id: impl Into<String>) -> Self {
        self.stripe_promotion_code_id = Some(stripe_id.into());
        self
    }
}

/// Links a subscriber to the promo code that acquired them.
///
/// One row per (user, promo code). Timestamps are set once and never moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCodeUsage {
    pub user_id: UserId,
    pub promo_code_id: PromoCodeId,
    pub applied_at: Timestamp,
    pub subscription_started_at: Option<Timestamp>,
    pub first_payment_at: Option<Timestamp>,
    pub churned_at: Option<Timestamp>,
}

impl PromoCodeUsage {
    pub fn new(user_id: UserId, promo_code_id: PromoCodeId, applied_at: Timestamp) -> Self {
        Self {
            user_id,
            promo_code_id,
            applied_at,
            subscription_started_at: None,
            first_payment_at: None,
            churned_at: None,
        }
    }

    pub fn is_churned(&self) -> bool {
        self.churned_at.is_some()
    }
}

/// Result of recording a subscription start against a usage row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageOutcome {
    /// This write set `subscription_started_at`; the usage counter was incremented.
    Started,
    /// The subscription start was already recorded; nothing counted.
    AlreadyStarted,
}

/// Immutable commission owed to an influencer for one subscriber milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfluencerCommission {
    pub id: CommissionId,
    pub user_id: UserId,
    pub promo_code_id: PromoCodeId,
    pub milestone: Milestone,
    /// Amount in minor currency units.
    pub amount: i64,
    pub eligible_at: Timestamp,
}

impl InfluencerCommission {
    pub fn new(
        user_id: UserId,
        promo_code_id: PromoCodeId,
        milestone: Milestone,
        amount: i64,
        eligible_at: Timestamp,
    ) -> Self {
        Self {
            id: CommissionId::new(),
            user_id,
            promo_code_id,
            milestone,
            amount,
            eligible_at,
        }
    }
}

/// Result of an insert-if-absent on (user, milestone).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommissionInsert {
    Inserted,
    AlreadyExists,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_promo_code_starts_unused() {
        let code = PromoCode::new("BUMP10", PromoTier::Micro).with_stripe_id("promo_1");
        assert_eq!(code.usage_count, 0);
        assert_eq!(code.stripe_promotion_code_id.as_deref(), Some("promo_1"));
    }

    #[test]
    fn new_usage_has_only_applied_at() {
        let usage = PromoCodeUsage::new(UserId::new(), PromoCodeId::new(), Timestamp::now());
        assert!(usage.subscription_started_at.is_none());
        assert!(usage.first_payment_at.is_none());
        assert!(!usage.is_churned());
    }
}
