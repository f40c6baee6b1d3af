//! PromoCodeRepository port - promo codes and their usage rows.

use async_trait::async_trait;

use crate::domain::billing::{PromoCode, PromoCodeUsage, UsageOutcome};
use crate::domain::foundation::{DomainError, PromoCodeId, Timestamp, UserId};

#[async_trait]
pub trait PromoCodeRepository: Send + Sync {
    /// Finds a promo code by its Stripe promotion code id (promo_...).
    async fn find_by_stripe_id(&self, stripe_id: &str) -> Result<Option<PromoCode>, DomainError>;

    /// Finds a promo code by its customer-facing code, case-insensitively.
    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCode>, DomainError>;

    async fn find_by_id(&self, id: &PromoCodeId) -> Result<Option<PromoCode>, DomainError>;

    /// Upserts the (user, code) usage row and records the subscription start.
    ///
    /// Must be one atomic operation:
    /// - `applied_at` keeps the earliest value
    /// - `subscription_started_at` is set only if absent
    /// - the code's `usage_count` is incremented only by the write that set
    ///   `subscription_started_at`, so replays never double count
    async fn record_subscription_start(
        &self,
        user_id: &UserId,
        promo_code_id: &PromoCodeId,
        at: Timestamp,
    ) -> Result<UsageOutcome, DomainError>;

    /// Sets `first_payment_at` on the user's usage row if absent.
    ///
    /// Returns true if this call set it.
    async fn mark_first_payment(&self, user_id: &UserId, at: Timestamp)
        -> Result<bool, DomainError>;

    /// Sets `churned_at` on the user's open usage rows. Returns the rows changed.
    async fn mark_churned(&self, user_id: &UserId, at: Timestamp) -> Result<u64, DomainError>;

    /// The usage row that attributes this user, earliest applied first.
    async fn find_usage_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PromoCodeUsage>, DomainError>;
}
