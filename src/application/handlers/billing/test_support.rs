//! Shared fixtures for billing handler tests.

use serde_json::json;
use std::sync::Arc;

use super::BillingServices;
use crate::adapters::memory::{
    InMemoryCommissionRepository, InMemoryProfileStore, InMemoryPromoCodeRepository,
};
use crate::adapters::stripe::MockBillingProvider;
use crate::domain::billing::stripe_event::StripeEventBuilder;
use crate::domain::billing::{
    CommissionSchedule, CustomerProfile, Plan, PriceTable, PromoCode, PromoTier, StatusMapper,
    StatusPolicy, StripeEvent,
};
use crate::domain::foundation::{PromoCodeId, Timestamp, UserId};

pub const MONTHLY_PRICE: &str = "price_monthly";
pub const ANNUAL_PRICE: &str = "price_annual";

/// 2024-01-01T00:00:00Z
pub const JAN_1_2024: i64 = 1_704_067_200;

pub struct Harness {
    pub services: BillingServices,
    pub profiles: InMemoryProfileStore,
    pub promo_codes: InMemoryPromoCodeRepository,
    pub commissions: InMemoryCommissionRepository,
    pub provider: MockBillingProvider,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(StatusPolicy::default())
    }

    pub fn with_policy(policy: StatusPolicy) -> Self {
        let profiles = InMemoryProfileStore::new();
        let promo_codes = InMemoryPromoCodeRepository::new();
        let commissions = InMemoryCommissionRepository::new();
        let provider = MockBillingProvider::new();
        let mapper = StatusMapper::new(
            policy,
            PriceTable::new([MONTHLY_PRICE], [ANNUAL_PRICE], Plan::PremiumMonthly),
        );
        let services = BillingServices::new(
            Arc::new(profiles.clone()),
            Arc::new(promo_codes.clone()),
            Arc::new(commissions.clone()),
            Arc::new(provider.clone()),
            mapper,
            CommissionSchedule::default(),
        );
        Self {
            services,
            profiles,
            promo_codes,
            commissions,
            provider,
        }
    }

    /// Seeds a profile created at `created_at` (unix seconds).
    pub async fn seed_profile(&self, email: &str, customer_id: Option<&str>, created_at: i64) -> UserId {
        let user_id = UserId::new();
        let created_at = Timestamp::from_unix(created_at).unwrap_or_else(Timestamp::now);
        let mut profile = CustomerProfile::new(user_id, email, created_at);
        profile.stripe_customer_id = customer_id.map(str::to_string);
        self.profiles.insert(profile).await;
        user_id
    }

    pub async fn seed_promo(&self, code: &str, stripe_id: &str, tier: PromoTier) -> PromoCodeId {
        let promo = PromoCode::new(code, tier).with_stripe_id(stripe_id);
        let id = promo.id;
        self.promo_codes.insert_code(promo).await;
        id
    }

    pub async fn profile(&self, user_id: &UserId) -> CustomerProfile {
        use crate::ports::ProfileStore;
        self.profiles
            .find_by_user_id(user_id)
            .await
            .unwrap()
            .unwrap()
    }
}

/// Subscription object as Stripe renders it in webhook payloads.
pub fn subscription_json(id: &str, customer: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "object": "subscription",
        "customer": customer,
        "status": status,
        "current_period_end": JAN_1_2024 + 30 * 86_400,
        "trial_end": null,
        "cancel_at_period_end": false,
        "items": {
            "object": "list",
            "data": [{
                "id": "si_1",
                "price": {"id": MONTHLY_PRICE, "unit_amount": 999, "currency": "gbp"}
            }]
        },
        "default_payment_method": null,
        "latest_invoice": null,
        "discount": null,
        "metadata": {}
    })
}

pub fn event(id: &str, event_type: &str, object: serde_json::Value, created: i64) -> StripeEvent {
    StripeEventBuilder::new()
        .id(id)
        .event_type(event_type)
        .created(created)
        .object(object)
        .build()
}
