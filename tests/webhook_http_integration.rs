//! Integration tests for the Stripe webhook endpoint.
//!
//! These drive the full router (verification, dedup, dispatch and store
//! writes) over the in-memory adapters and the mock billing provider.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use babyplan_billing::adapters::http::{app_router, BillingAppState};
use babyplan_billing::adapters::memory::{
    InMemoryCommissionRepository, InMemoryProfileStore, InMemoryPromoCodeRepository,
    InMemoryWebhookEventLog,
};
use babyplan_billing::adapters::stripe::MockBillingProvider;
use babyplan_billing::application::{BillingServices, StripeReconciler};
use babyplan_billing::config::ServerConfig;
use babyplan_billing::domain::billing::{
    sign_payload, CommissionSchedule, CustomerProfile, LocalStatus, Plan, PriceTable, PromoCode,
    PromoTier, StatusMapper, StatusPolicy, StripeWebhookVerifier,
};
use babyplan_billing::domain::foundation::{PromoCodeId, Timestamp, UserId};
use babyplan_billing::ports::{ProfileStore, PromoCodeRepository, WebhookEventLog};

// =============================================================================
// Test Infrastructure
// =============================================================================

const SECRET: &str = "whsec_integration_secret";

/// 2024-01-01T00:00:00Z
const JAN_1_2024: i64 = 1_704_067_200;

struct TestApp {
    router: Router,
    log: InMemoryWebhookEventLog,
    profiles: InMemoryProfileStore,
    promo_codes: InMemoryPromoCodeRepository,
    commissions: InMemoryCommissionRepository,
}

impl TestApp {
    fn new() -> Self {
        let log = InMemoryWebhookEventLog::new();
        let profiles = InMemoryProfileStore::new();
        let promo_codes = InMemoryPromoCodeRepository::new();
        let commissions = InMemoryCommissionRepository::new();

        let services = BillingServices::new(
            Arc::new(profiles.clone()),
            Arc::new(promo_codes.clone()),
            Arc::new(commissions.clone()),
            Arc::new(MockBillingProvider::new()),
            StatusMapper::new(
                StatusPolicy::default(),
                PriceTable::new(["price_monthly"], ["price_annual"], Plan::PremiumMonthly),
            ),
            CommissionSchedule::default(),
        );
        let reconciler = StripeReconciler::new(
            StripeWebhookVerifier::new(SECRET),
            Arc::new(log.clone()),
            services,
        );

        Self {
            router: app_router(BillingAppState::new(reconciler), &ServerConfig::default()),
            log,
            profiles,
            promo_codes,
            commissions,
        }
    }

    async fn seed_profile(&self, email: &str, customer_id: &str) -> UserId {
        let user_id = UserId::new();
        let created_at = Timestamp::from_unix(JAN_1_2024).unwrap();
        let mut profile = CustomerProfile::new(user_id, email, created_at);
        profile.stripe_customer_id = Some(customer_id.to_string());
        self.profiles.insert(profile).await;
        user_id
    }

    async fn seed_promo(&self, code: &str, stripe_id: &str) -> PromoCodeId {
        let promo = PromoCode::new(code, PromoTier::Mid).with_stripe_id(stripe_id);
        let id = promo.id;
        self.promo_codes.insert_code(promo).await;
        id
    }

    async fn profile(&self, user_id: &UserId) -> CustomerProfile {
        self.profiles.find_by_user_id(user_id).await.unwrap().unwrap()
    }

    /// Posts a correctly signed delivery.
    async fn deliver(&self, body: &Value) -> (StatusCode, Value) {
        let payload = serde_json::to_vec(body).unwrap();
        let signature = sign_payload(SECRET, chrono::Utc::now().timestamp(), &payload);
        self.post(payload, Some(signature)).await
    }

    async fn post(&self, payload: Vec<u8>, signature: Option<String>) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri("/webhooks/stripe")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            request = request.header("Stripe-Signature", signature);
        }
        let response = self
            .router
            .clone()
            .oneshot(request.body(Body::from(payload)).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

fn subscription(id: &str, customer: &str, status: &str) -> Value {
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
                "price": {"id": "price_annual", "unit_amount": 7999, "currency": "gbp"}
            }]
        },
        "default_payment_method": null,
        "latest_invoice": null,
        "discount": null,
        "metadata": {}
    })
}

fn event(id: &str, event_type: &str, object: Value, created: i64) -> Value {
    json!({
        "id": id,
        "object": "event",
        "type": event_type,
        "created": created,
        "livemode": false,
        "api_version": "2023-10-16",
        "data": {"object": object}
    })
}

// =============================================================================
// Transport
// =============================================================================

#[tokio::test]
async fn health_check_returns_ok() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn missing_signature_is_rejected_before_logging() {
    let app = TestApp::new();
    let body = event("evt_1", "invoice.upcoming", json!({"id": "in_1"}), JAN_1_2024);

    let (status, response) = app
        .post(serde_json::to_vec(&body).unwrap(), None)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].is_string());
    assert!(app.log.is_empty().await);
}

#[tokio::test]
async fn oversized_body_is_rejected_before_logging() {
    let app = TestApp::new();
    let payload = vec![b' '; ServerConfig::default().max_body_bytes + 1];

    let (status, _) = app.post(payload, None).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.log.is_empty().await);
}

#[tokio::test]
async fn wrong_secret_is_rejected() {
    let app = TestApp::new();
    let payload = serde_json::to_vec(&event("evt_1", "invoice.upcoming", json!({}), JAN_1_2024))
        .unwrap();
    let signature = sign_payload("whsec_other", chrono::Utc::now().timestamp(), &payload);

    let (status, _) = app.post(payload, Some(signature)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.log.is_empty().await);
}

#[tokio::test]
async fn signed_garbage_is_a_bad_request() {
    let app = TestApp::new();
    let payload = b"not json".to_vec();
    let signature = sign_payload(SECRET, chrono::Utc::now().timestamp(), &payload);

    let (status, _) = app.post(payload, Some(signature)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn unknown_event_type_is_acknowledged_and_logged() {
    let app = TestApp::new();

    let (status, body) = app
        .deliver(&event("evt_unknown", "invoice.upcoming", json!({"id": "in_1"}), JAN_1_2024))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"received": true}));
    let record = app.log.find_by_event_id("evt_unknown").await.unwrap().unwrap();
    assert!(record.processed);
    assert!(record.error.is_none());
}

#[tokio::test]
async fn subscription_update_reaches_the_profile() {
    let app = TestApp::new();
    let user = app.seed_profile("parent@example.com", "cus_1").await;

    let (status, _) = app
        .deliver(&event(
            "evt_1",
            "customer.subscription.updated",
            subscription("sub_1", "cus_1", "trialing"),
            JAN_1_2024,
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    let profile = app.profile(&user).await;
    assert_eq!(profile.subscription_status, LocalStatus::Trial);
    assert_eq!(profile.subscription_plan, Plan::PremiumAnnual);
    assert_eq!(profile.locked_in_price, Some(7999));
}

#[tokio::test]
async fn trial_subscription_created_sets_trial_monthly_and_trial_end() {
    let app = TestApp::new();
    let user = app.seed_profile("parent@example.com", "cus_1").await;
    let trial_end = JAN_1_2024 + 14 * 86_400;
    let mut sub = subscription("sub_1", "cus_1", "trialing");
    sub["trial_end"] = json!(trial_end);
    sub["items"]["data"][0]["price"] = json!({"id": "price_monthly", "unit_amount": 999, "currency": "gbp"});

    let (status, _) = app
        .deliver(&event("evt_trial", "customer.subscription.created", sub, JAN_1_2024))
        .await;

    assert_eq!(status, StatusCode::OK);
    let profile = app.profile(&user).await;
    assert_eq!(profile.subscription_status, LocalStatus::Trial);
    assert_eq!(profile.subscription_plan, Plan::PremiumMonthly);
    assert_eq!(profile.trial_end, Timestamp::from_unix(trial_end));
}

#[tokio::test]
async fn duplicate_delivery_is_acknowledged_once() {
    let app = TestApp::new();
    app.seed_profile("parent@example.com", "cus_1").await;
    let body = event(
        "evt_1",
        "customer.subscription.updated",
        subscription("sub_1", "cus_1", "active"),
        JAN_1_2024,
    );

    let (first, _) = app.deliver(&body).await;
    let (second, response) = app.deliver(&body).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(response, json!({"received": true}));
    assert_eq!(app.log.len().await, 1);
}

#[tokio::test]
async fn failed_event_is_retried_on_redelivery() {
    let app = TestApp::new();
    let body = event(
        "evt_early",
        "customer.subscription.created",
        subscription("sub_1", "cus_late", "active"),
        JAN_1_2024,
    );

    // The profile is not linked to the customer yet.
    let (status, _) = app.deliver(&body).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let record = app.log.find_by_event_id("evt_early").await.unwrap().unwrap();
    assert!(!record.processed);
    assert!(record.error.is_some());

    let user = app.seed_profile("late@example.com", "cus_late").await;
    let (status, _) = app.deliver(&body).await;

    assert_eq!(status, StatusCode::OK);
    let record = app.log.find_by_event_id("evt_early").await.unwrap().unwrap();
    assert!(record.processed);
    assert!(record.error.is_none());
    assert_eq!(app.profile(&user).await.subscription_status, LocalStatus::Active);
}

#[tokio::test]
async fn late_update_does_not_resurrect_deleted_subscription() {
    let app = TestApp::new();
    let user = app.seed_profile("parent@example.com", "cus_1").await;

    app.deliver(&event(
        "evt_created",
        "customer.subscription.created",
        subscription("sub_1", "cus_1", "active"),
        JAN_1_2024,
    ))
    .await;
    app.deliver(&event(
        "evt_deleted",
        "customer.subscription.deleted",
        subscription("sub_1", "cus_1", "canceled"),
        JAN_1_2024 + 3_600,
    ))
    .await;
    let (status, _) = app
        .deliver(&event(
            "evt_stale",
            "customer.subscription.updated",
            subscription("sub_1", "cus_1", "active"),
            JAN_1_2024 + 60,
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    let profile = app.profile(&user).await;
    assert_eq!(profile.subscription_status, LocalStatus::Free);
    assert_eq!(profile.subscription_plan, Plan::Free);
}

#[tokio::test]
async fn late_update_for_deleted_subscription_does_not_replace_its_successor() {
    let app = TestApp::new();
    let user = app.seed_profile("parent@example.com", "cus_1").await;

    for (id, event_type, sub, created) in [
        ("evt_1", "customer.subscription.created", subscription("sub_1", "cus_1", "active"), JAN_1_2024),
        ("evt_2", "customer.subscription.deleted", subscription("sub_1", "cus_1", "canceled"), JAN_1_2024 + 3_600),
        ("evt_3", "customer.subscription.created", subscription("sub_2", "cus_1", "trialing"), JAN_1_2024 + 7_200),
        ("evt_4", "customer.subscription.updated", subscription("sub_1", "cus_1", "active"), JAN_1_2024 + 60),
    ] {
        let (status, _) = app.deliver(&event(id, event_type, sub, created)).await;
        assert_eq!(status, StatusCode::OK, "event {}", id);
    }

    let profile = app.profile(&user).await;
    assert_eq!(profile.stripe_subscription_id.as_deref(), Some("sub_2"));
    assert_eq!(profile.subscription_status, LocalStatus::Trial);
    assert_eq!(profile.stripe_subscription_status.as_deref(), Some("trialing"));
}

#[tokio::test]
async fn promo_usage_is_counted_once_across_replays() {
    let app = TestApp::new();
    let user = app.seed_profile("parent@example.com", "cus_1").await;
    let code_id = app.seed_promo("BUMP10", "promo_1").await;
    let mut sub = subscription("sub_1", "cus_1", "active");
    sub["discount"] = json!({"promotion_code": "promo_1"});

    let created = event("evt_created", "customer.subscription.created", sub.clone(), JAN_1_2024);
    app.deliver(&created).await;
    app.deliver(&event("evt_updated", "customer.subscription.updated", sub, JAN_1_2024 + 60))
        .await;
    app.deliver(&created).await;

    let code = app.promo_codes.find_by_id(&code_id).await.unwrap().unwrap();
    assert_eq!(code.usage_count, 1);
    assert_eq!(app.promo_codes.usages_for(&user).await.len(), 1);
    assert_eq!(app.commissions.len().await, 1);
}
