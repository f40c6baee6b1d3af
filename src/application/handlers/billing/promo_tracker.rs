//! Promo code attribution and influencer commission tracking.
//!
//! Every write is idempotent: the usage row is keyed on (user, promo code),
//! the usage counter only moves on the write that first sets
//! `subscription_started_at`, and commissions are insert-if-absent on
//! (user, milestone).

use crate::domain::billing::stripe_objects::PromoReference;
use crate::domain::billing::{
    CommissionInsert, InfluencerCommission, Milestone, PromoCode, UsageOutcome, WebhookError,
};
use crate::domain::foundation::{PromoCodeId, Timestamp, UserId};

use super::BillingServices;

/// Result of attributing a subscription to a promo code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// The code is not one we track.
    Untracked,
    Tracked {
        promo_code_id: PromoCodeId,
        usage: UsageOutcome,
        /// `None` when no first-period revenue was known.
        first_month: Option<CommissionInsert>,
    },
}

/// Result of a retention milestone check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneOutcome {
    /// The user did not subscribe through a tracked code.
    NotAttributed,
    Recorded(CommissionInsert),
}

pub struct PromoTracker<'a> {
    services: &'a BillingServices,
}

impl<'a> PromoTracker<'a> {
    pub fn new(services: &'a BillingServices) -> Self {
        Self { services }
    }

    /// Records that `user_id` subscribed through a promo code.
    ///
    /// `price_amount` is the first-period revenue in minor units; the
    /// first-month commission pays all of it.
    pub async fn track_conversion(
        &self,
        reference: &PromoReference,
        user_id: &UserId,
        price_amount: Option<i64>,
        at: Timestamp,
    ) -> Result<ConversionOutcome, WebhookError> {
        let Some(code) = self.resolve(reference).await? else {
            tracing::info!(
                user_id = %user_id,
                promo = ?reference,
                "Promo code is not tracked, skipping attribution"
            );
            return Ok(ConversionOutcome::Untracked);
        };

        let usage = self
            .services
            .promo_codes
            .record_subscription_start(user_id, &code.id, at)
            .await?;

        let first_month = match price_amount.filter(|amount| *amount > 0) {
            Some(amount) => {
                let commission =
                    InfluencerCommission::new(*user_id, code.id, Milestone::FirstMonth, amount, at);
                Some(self.services.commissions.insert_if_absent(&commission).await?)
            }
            None => {
                tracing::info!(
                    user_id = %user_id,
                    promo_code = %code.code,
                    "No first-period revenue, skipping first-month commission"
                );
                None
            }
        };

        tracing::info!(
            user_id = %user_id,
            promo_code = %code.code,
            tier = %code.tier,
            counted = usage == UsageOutcome::Started,
            "Promo conversion tracked"
        );

        Ok(ConversionOutcome::Tracked {
            promo_code_id: code.id,
            usage,
            first_month,
        })
    }

    /// Records the retention bonus for `milestone` if the user is attributed
    /// to a promo code and has not been paid for it yet.
    pub async fn check_milestone(
        &self,
        user_id: &UserId,
        milestone: Milestone,
        at: Timestamp,
    ) -> Result<MilestoneOutcome, WebhookError> {
        let Some(usage) = self.services.promo_codes.find_usage_for_user(user_id).await? else {
            return Ok(MilestoneOutcome::NotAttributed);
        };

        let Some(code) = self
            .services
            .promo_codes
            .find_by_id(&usage.promo_code_id)
            .await?
        else {
            tracing::warn!(
                user_id = %user_id,
                promo_code_id = %usage.promo_code_id,
                "Usage row points at a missing promo code"
            );
            return Ok(MilestoneOutcome::NotAttributed);
        };

        let Some(amount) = self.services.schedule.bonus(code.tier, milestone) else {
            return Ok(MilestoneOutcome::NotAttributed);
        };

        let commission = InfluencerCommission::new(*user_id, code.id, milestone, amount, at);
        let inserted = self.services.commissions.insert_if_absent(&commission).await?;

        if inserted == CommissionInsert::Inserted {
            tracing::info!(
                user_id = %user_id,
                promo_code = %code.code,
                milestone = %milestone,
                amount,
                "Milestone commission recorded"
            );
        }
        Ok(MilestoneOutcome::Recorded(inserted))
    }

    /// Finds the tracked code. An unknown promotion id is looked up in
    /// Stripe and matched by its code string.
    async fn resolve(&self, reference: &PromoReference) -> Result<Option<PromoCode>, WebhookError> {
        let promo_codes = &self.services.promo_codes;
        match reference {
            PromoReference::Code(code) => Ok(promo_codes.find_by_code(code).await?),
            PromoReference::PromotionId(id) => {
                if let Some(code) = promo_codes.find_by_stripe_id(id).await? {
                    return Ok(Some(code));
                }
                match self.services.provider.get_promotion_code(id).await {
                    Ok(Some(promotion)) => match promotion.code {
                        Some(code) => Ok(promo_codes.find_by_code(&code).await?),
                        None => Ok(None),
                    },
                    Ok(None) => Ok(None),
                    Err(err) => {
                        tracing::warn!(
                            promotion_code_id = %id,
                            error = %err,
                            "Promotion code lookup failed"
                        );
                        Ok(None)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::*;
    use crate::domain::billing::stripe_objects::StripePromotionCode;
    use crate::domain::billing::PromoTier;
    use crate::ports::{CommissionRepository, PromoCodeRepository};

    fn at() -> Timestamp {
        Timestamp::from_unix(JAN_1_2024).unwrap()
    }

    #[tokio::test]
    async fn conversion_records_usage_and_first_month() {
        let h = Harness::new();
        let code_id = h.seed_promo("BUMP10", "promo_1", PromoTier::Mid).await;
        let user = UserId::new();

        let outcome = PromoTracker::new(&h.services)
            .track_conversion(
                &PromoReference::PromotionId("promo_1".into()),
                &user,
                Some(999),
                at(),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ConversionOutcome::Tracked {
                promo_code_id: code_id,
                usage: UsageOutcome::Started,
                first_month: Some(CommissionInsert::Inserted),
            }
        );
        let rows = h.commissions.list_for_user(&user).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].milestone, Milestone::FirstMonth);
        assert_eq!(rows[0].amount, 999);
    }

    #[tokio::test]
    async fn repeated_conversion_counts_once() {
        let h = Harness::new();
        let code_id = h.seed_promo("BUMP10", "promo_1", PromoTier::Mid).await;
        let user = UserId::new();
        let tracker = PromoTracker::new(&h.services);
        let reference = PromoReference::PromotionId("promo_1".into());

        tracker.track_conversion(&reference, &user, Some(999), at()).await.unwrap();
        let again = tracker.track_conversion(&reference, &user, Some(999), at()).await.unwrap();

        assert!(matches!(
            again,
            ConversionOutcome::Tracked {
                usage: UsageOutcome::AlreadyStarted,
                first_month: Some(CommissionInsert::AlreadyExists),
                ..
            }
        ));
        let code = h.promo_codes.find_by_id(&code_id).await.unwrap().unwrap();
        assert_eq!(code.usage_count, 1);
        assert_eq!(h.commissions.len().await, 1);
    }

    #[tokio::test]
    async fn untracked_code_is_a_no_op() {
        let h = Harness::new();
        let outcome = PromoTracker::new(&h.services)
            .track_conversion(&PromoReference::Code("NOPE".into()), &UserId::new(), Some(999), at())
            .await
            .unwrap();

        assert_eq!(outcome, ConversionOutcome::Untracked);
        assert!(h.commissions.is_empty().await);
    }

    #[tokio::test]
    async fn metadata_code_matches_case_insensitively() {
        let h = Harness::new();
        h.seed_promo("BUMP10", "promo_1", PromoTier::Micro).await;

        let outcome = PromoTracker::new(&h.services)
            .track_conversion(&PromoReference::Code("bump10".into()), &UserId::new(), None, at())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ConversionOutcome::Tracked { first_month: None, .. }
        ));
    }

    #[tokio::test]
    async fn unknown_promotion_id_resolves_through_stripe() {
        let h = Harness::new();
        h.seed_promo("BUMP10", "promo_old", PromoTier::Top).await;
        h.provider.add_promotion_code(StripePromotionCode {
            id: "promo_new".into(),
            code: Some("BUMP10".into()),
        });

        let outcome = PromoTracker::new(&h.services)
            .track_conversion(
                &PromoReference::PromotionId("promo_new".into()),
                &UserId::new(),
                Some(500),
                at(),
            )
            .await
            .unwrap();

        assert!(matches!(outcome, ConversionOutcome::Tracked { .. }));
    }

    #[tokio::test]
    async fn milestone_bonus_uses_tier_schedule() {
        let h = Harness::new();
        h.seed_promo("BUMP10", "promo_1", PromoTier::Top).await;
        let user = UserId::new();
        let tracker = PromoTracker::new(&h.services);
        tracker
            .track_conversion(&PromoReference::PromotionId("promo_1".into()), &user, None, at())
            .await
            .unwrap();

        let first = tracker.check_milestone(&user, Milestone::ThreeMonths, at()).await.unwrap();
        let second = tracker.check_milestone(&user, Milestone::ThreeMonths, at()).await.unwrap();

        assert_eq!(first, MilestoneOutcome::Recorded(CommissionInsert::Inserted));
        assert_eq!(second, MilestoneOutcome::Recorded(CommissionInsert::AlreadyExists));
        let rows = h.commissions.list_for_user(&user).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, 1000);
    }

    #[tokio::test]
    async fn milestone_without_attribution_is_skipped() {
        let h = Harness::new();
        let outcome = PromoTracker::new(&h.services)
            .check_milestone(&UserId::new(), Milestone::SixMonths, at())
            .await
            .unwrap();
        assert_eq!(outcome, MilestoneOutcome::NotAttributed);
    }
}
