//! Billing domain module.
//!
//! Reconciles Stripe subscription events onto customer profiles.
//!
//! # Module Structure
//!
//! - `status` - Local entitlement status and plan
//! - `status_mapper` - Stripe status/price → local status/plan, with policies
//! - `profile` - Customer profile billing fields and their conditional writes
//! - `stripe_event` - Webhook event envelope and event type table
//! - `stripe_objects` - Stripe objects read from payloads and lookups
//! - `webhook_verifier` - HMAC-SHA256 signature verification
//! - `webhook_errors` - Error taxonomy and HTTP mapping
//! - `commission` - Milestones, tiers and the bonus schedule
//! - `promo` - Promo code, usage and commission records

mod commission;
mod profile;
mod promo;
mod status;
mod status_mapper;
pub mod stripe_event;
pub mod stripe_objects;
mod webhook_errors;
mod webhook_verifier;

pub use commission::{CommissionSchedule, Milestone, PromoTier, TierAmounts};
pub use profile::{
    CustomerProfile, PaymentMethodSnapshot, PromoAttribution, SubscriptionEnd, SubscriptionSync,
    UpdateOutcome, CANCELED_STATUS,
};
pub use promo::{CommissionInsert, InfluencerCommission, PromoCode, PromoCodeUsage, UsageOutcome};
pub use status::{LocalStatus, Plan};
pub use status_mapper::{
    EndedPolicy, ExternalStatus, PastDuePolicy, PaymentFailedPolicy, PriceTable, StatusMapper,
    StatusPolicy,
};
pub use stripe_event::{StripeEvent, StripeEventData, StripeEventType};
pub use webhook_errors::{WebhookError, WebhookErrorClass};
pub use webhook_verifier::{sign_payload, SignatureHeader, StripeWebhookVerifier, DEFAULT_TOLERANCE_SECS};
