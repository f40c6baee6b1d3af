//! Stripe API objects as they arrive in webhook payloads and lookups.
//!
//! Only the fields the reconciler reads are captured. Every reference field
//! may be either a bare id or an expanded object, depending on how the
//! payload was rendered, so those are typed as [`Expandable`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A Stripe object that carries an id.
pub trait StripeObject {
    fn object_id(&self) -> &str;
}

/// Reference to another Stripe object, either by id or expanded inline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

impl<T: StripeObject> Expandable<T> {
    /// Returns the referenced object's id regardless of expansion.
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object(obj) => obj.object_id(),
        }
    }

    /// Returns the expanded object, if the payload carried one.
    pub fn as_object(&self) -> Option<&T> {
        match self {
            Expandable::Id(_) => None,
            Expandable::Object(obj) => Some(obj),
        }
    }
}

macro_rules! impl_stripe_object {
    ($($ty:ty),* $(,)?) => {
        $(impl StripeObject for $ty {
            fn object_id(&self) -> &str {
                &self.id
            }
        })*
    };
}

impl_stripe_object!(
    StripeCustomer,
    StripeSubscription,
    StripeInvoice,
    StripePaymentIntent,
    StripePaymentMethod,
    StripePromotionCode,
    StripeCheckoutSession,
);

// ════════════════════════════════════════════════════════════════════════════════
// Customer
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Customer object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCustomer {
    /// Unique customer identifier (cus_...).
    pub id: String,

    #[serde(default)]
    pub email: Option<String>,

    /// Set on the stub Stripe returns for a deleted customer.
    #[serde(default)]
    pub deleted: bool,
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscription
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Subscription object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    /// Unique subscription identifier (sub_...).
    pub id: String,

    pub customer: Expandable<StripeCustomer>,

    /// Raw Stripe status (trialing, active, past_due, canceled, ...).
    pub status: String,

    #[serde(default)]
    pub current_period_end: Option<i64>,

    #[serde(default)]
    pub trial_end: Option<i64>,

    #[serde(default)]
    pub cancel_at_period_end: bool,

    #[serde(default)]
    pub items: StripeList<StripeSubscriptionItem>,

    #[serde(default)]
    pub default_payment_method: Option<Expandable<StripePaymentMethod>>,

    #[serde(default)]
    pub latest_invoice: Option<Expandable<StripeInvoice>>,

    #[serde(default)]
    pub discount: Option<StripeDiscount>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeSubscription {
    pub fn customer_id(&self) -> &str {
        self.customer.id()
    }

    /// Price of the first subscription item.
    pub fn price(&self) -> Option<&StripePrice> {
        self.items.data.first().map(|item| &item.price)
    }

    pub fn price_id(&self) -> Option<&str> {
        self.price().map(|p| p.id.as_str())
    }

    /// Current period end, read from the item when the subscription omits it.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .data
                .first()
                .and_then(|item| item.current_period_end)
        })
    }

    /// Promotion code applied through the subscription's discount.
    pub fn promotion_code_id(&self) -> Option<&str> {
        self.discount
            .as_ref()
            .and_then(|d| d.promotion_code.as_ref())
            .map(|p| p.id())
    }
}

/// Generic Stripe list container.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Default for StripeList<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

/// Single subscription item.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscriptionItem {
    #[serde(default)]
    pub id: Option<String>,

    pub price: StripePrice,

    /// Newer API versions report the billing period per item.
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

/// Stripe Price object (embedded in subscription items).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePrice {
    /// Price ID.
    pub id: String,

    /// Unit amount in minor currency units.
    #[serde(default)]
    pub unit_amount: Option<i64>,

    #[serde(default)]
    pub currency: Option<String>,
}

/// Discount applied to a subscription or checkout session.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeDiscount {
    #[serde(default)]
    pub promotion_code: Option<Expandable<StripePromotionCode>>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Invoice
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Invoice object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoice {
    /// Unique invoice identifier (in_...).
    pub id: String,

    #[serde(default)]
    pub customer: Option<Expandable<StripeCustomer>>,

    /// Absent for one-off invoices.
    #[serde(default)]
    pub subscription: Option<Expandable<StripeSubscription>>,

    /// Amount paid in minor currency units.
    #[serde(default)]
    pub amount_paid: i64,

    #[serde(default)]
    pub payment_intent: Option<Expandable<StripePaymentIntent>>,

    #[serde(default)]
    pub billing_reason: Option<String>,
}

impl StripeInvoice {
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_ref().map(|s| s.id())
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.customer.as_ref().map(|c| c.id())
    }

    /// Payment method reference from an expanded payment intent.
    pub fn payment_method(&self) -> Option<&Expandable<StripePaymentMethod>> {
        self.payment_intent
            .as_ref()
            .and_then(|pi| pi.as_object())
            .and_then(|pi| pi.payment_method.as_ref())
    }
}

/// Stripe PaymentIntent object (only as embedded in invoices).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePaymentIntent {
    pub id: String,

    #[serde(default)]
    pub payment_method: Option<Expandable<StripePaymentMethod>>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Payment method
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe PaymentMethod object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePaymentMethod {
    /// Payment method identifier (pm_...).
    pub id: String,

    #[serde(default)]
    pub customer: Option<Expandable<StripeCustomer>>,

    /// Present only for card payment methods.
    #[serde(default)]
    pub card: Option<StripeCard>,
}

impl StripePaymentMethod {
    pub fn customer_id(&self) -> Option<&str> {
        self.customer.as_ref().map(|c| c.id())
    }
}

/// Card details on a payment method.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCard {
    pub brand: String,
    pub last4: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Promotion code
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe PromotionCode object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePromotionCode {
    /// Promotion code identifier (promo_...).
    pub id: String,

    /// Customer-facing code string.
    #[serde(default)]
    pub code: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Checkout session
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Checkout Session object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    /// Unique session identifier (cs_...).
    pub id: String,

    #[serde(default)]
    pub customer: Option<Expandable<StripeCustomer>>,

    #[serde(default)]
    pub customer_email: Option<String>,

    #[serde(default)]
    pub customer_details: Option<StripeCustomerDetails>,

    #[serde(default)]
    pub subscription: Option<Expandable<StripeSubscription>>,

    /// Total charged in minor currency units.
    #[serde(default)]
    pub amount_total: Option<i64>,

    #[serde(default)]
    pub discounts: Vec<StripeDiscount>,

    #[serde(default)]
    pub total_details: Option<StripeTotalDetails>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Buyer details collected during checkout.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

/// Totals breakdown on a checkout session.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeTotalDetails {
    #[serde(default)]
    pub breakdown: Option<StripeBreakdown>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeBreakdown {
    #[serde(default)]
    pub discounts: Vec<StripeBreakdownDiscount>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeBreakdownDiscount {
    pub discount: StripeDiscount,
}

/// How a checkout session identifies the promo code it used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromoReference {
    /// Stripe promotion code id (promo_...).
    PromotionId(String),
    /// Customer-facing code string passed through session metadata.
    Code(String),
}

impl StripeCheckoutSession {
    /// Buyer email, preferring the address collected at checkout.
    pub fn buyer_email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .or(self.customer_email.as_deref())
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.customer.as_ref().map(|c| c.id())
    }

    /// Promo code used for this checkout, if any.
    ///
    /// Searched in order: session discounts, the totals breakdown, then a
    /// `promo_code` metadata entry set by the app when it created the session.
    pub fn promo_reference(&self) -> Option<PromoReference> {
        let from_discounts = self
            .discounts
            .iter()
            .find_map(|d| d.promotion_code.as_ref());

        let from_breakdown = || {
            self.total_details
                .as_ref()
                .and_then(|t| t.breakdown.as_ref())
                .and_then(|b| {
                    b.discounts
                        .iter()
                        .find_map(|d| d.discount.promotion_code.as_ref())
                })
        };

        if let Some(promo) = from_discounts.or_else(from_breakdown) {
            return Some(PromoReference::PromotionId(promo.id().to_string()));
        }

        self.metadata
            .get("promo_code")
            .map(|code| code.trim())
            .filter(|code| !code.is_empty())
            .map(|code| PromoReference::Code(code.to_string()))
    }
}
