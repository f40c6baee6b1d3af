//! Stripe webhook event envelope.
//!
//! Only the envelope is typed here. The `data.object` payload stays as raw
//! JSON until a handler deserializes it into one of the object types in
//! [`stripe_objects`](super::stripe_objects).

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// Unique identifier for the event (evt_xxx format).
    pub id: String,

    /// Type of event (e.g., "customer.subscription.updated").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (Unix timestamp).
    pub created: i64,

    /// Object containing event-specific data.
    pub data: StripeEventData,

    /// Whether this is a live mode event (vs test mode).
    #[serde(default)]
    pub livemode: bool,

    /// API version used to render this event. Null for some legacy events.
    #[serde(default)]
    pub api_version: Option<String>,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object that triggered the event (polymorphic based on event type).
    pub object: serde_json::Value,

    /// Previous values for updated attributes (only for update events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl StripeEvent {
    pub fn is_live(&self) -> bool {
        self.livemode
    }

    /// Attempts to deserialize the data object as the specified type.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data.object)
    }

    /// The time the event happened according to Stripe.
    ///
    /// All period, expiry and account-age computations use this, never the
    /// processing clock.
    pub fn occurred_at(&self) -> Timestamp {
        Timestamp::from_unix(self.created).unwrap_or_else(Timestamp::now)
    }

    /// Parse the event type into a known enum variant.
    pub fn parsed_type(&self) -> StripeEventType {
        StripeEventType::parse(&self.event_type)
    }
}

/// Stripe event types the reconciler acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StripeEventType {
    CustomerCreated,
    CustomerUpdated,
    CheckoutSessionCompleted,
    CustomerSubscriptionCreated,
    CustomerSubscriptionUpdated,
    CustomerSubscriptionDeleted,
    CustomerSubscriptionTrialWillEnd,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
    PaymentMethodAttached,
    PaymentMethodUpdated,
    /// Anything else Stripe may send; accepted as a no-op.
    Unknown,
}

impl StripeEventType {
    /// Every type with a handler, in dispatch-table order.
    pub const HANDLED: [StripeEventType; 11] = [
        Self::CustomerCreated,
        Self::CustomerUpdated,
        Self::CheckoutSessionCompleted,
        Self::CustomerSubscriptionCreated,
        Self::CustomerSubscriptionUpdated,
        Self::CustomerSubscriptionDeleted,
        Self::CustomerSubscriptionTrialWillEnd,
        Self::InvoicePaymentSucceeded,
        Self::InvoicePaymentFailed,
        Self::PaymentMethodAttached,
        Self::PaymentMethodUpdated,
    ];

    /// Parse event type from string.
    pub fn parse(s: &str) -> Self {
        match s {
            "customer.created" => Self::CustomerCreated,
            "customer.updated" => Self::CustomerUpdated,
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.created" => Self::CustomerSubscriptionCreated,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            "customer.subscription.trial_will_end" => Self::CustomerSubscriptionTrialWillEnd,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            "payment_method.attached" => Self::PaymentMethodAttached,
            "payment_method.updated" => Self::PaymentMethodUpdated,
            _ => Self::Unknown,
        }
    }

    /// Convert to the Stripe event type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerCreated => "customer.created",
            Self::CustomerUpdated => "customer.updated",
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::CustomerSubscriptionCreated => "customer.subscription.created",
            Self::CustomerSubscriptionUpdated => "customer.subscription.updated",
            Self::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            Self::CustomerSubscriptionTrialWillEnd => "customer.subscription.trial_will_end",
            Self::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            Self::InvoicePaymentFailed => "invoice.payment_failed",
            Self::PaymentMethodAttached => "payment_method.attached",
            Self::PaymentMethodUpdated => "payment_method.updated",
            Self::Unknown => "unknown",
        }
    }
}

/// Builder for creating test StripeEvent instances.
#[cfg(test)]
pub struct StripeEventBuilder {
    id: String,
    event_type: String,
    created: i64,
    object: serde_json::Value,
    previous_attributes: Option<serde_json::Value>,
    livemode: bool,
}

#[cfg(test)]
impl Default for StripeEventBuilder {
    fn default() -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event_type: "customer.subscription.updated".to_string(),
            created: 1_704_067_200,
            object: serde_json::json!({}),
            previous_attributes: None,
            livemode: false,
        }
    }
}

#[cfg(test)]
impl StripeEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn created(mut self, created: i64) -> Self {
        self.created = created;
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn previous_attributes(mut self, attrs: serde_json::Value) -> Self {
        self.previous_attributes = Some(attrs);
        self
    }

    pub fn livemode(mut self, livemode: bool) -> Self {
        self.livemode = livemode;
        self
    }

    pub fn build(self) -> StripeEvent {
        StripeEvent {
            id: self.id,
            event_type: self.event_type,
            created: self.created,
            data: StripeEventData {
                object: self.object,
                previous_attributes: self.previous_attributes,
            },
            livemode: self.livemode,
            api_version: Some("2023-10-16".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ══════════════════════════════════════════════════════════════
    // Deserialization
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn deserialize_minimal_event() {
        let json = r#"{
            "id": "evt_1234567890",
            "type": "customer.subscription.created",
            "created": 1704067200,
            "data": { "object": {} },
            "livemode": false,
            "api_version": "2023-10-16"
        }"#;

        let event: StripeEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.id, "evt_1234567890");
        assert_eq!(event.event_type, "customer.subscription.created");
        assert_eq!(event.created, 1704067200);
        assert!(!event.is_live());
        assert_eq!(event.api_version.as_deref(), Some("2023-10-16"));
    }

    #[test]
    fn deserialize_tolerates_null_api_version_and_missing_livemode() {
        let json = r#"{
            "id": "evt_legacy",
            "type": "customer.created",
            "created": 1704067200,
            "data": { "object": {"id": "cus_1"} },
            "api_version": null
        }"#;

        let event: StripeEvent = serde_json::from_str(json).unwrap();
        assert!(event.api_version.is_none());
        assert!(!event.livemode);
    }

    #[test]
    fn deserialize_event_with_previous_attributes() {
        let json = r#"{
            "id": "evt_update_123",
            "type": "customer.subscription.updated",
            "created": 1704067200,
            "data": {
                "object": {"status": "active"},
                "previous_attributes": {"status": "past_due"}
            },
            "livemode": true,
            "api_version": "2023-10-16"
        }"#;

        let event: StripeEvent = serde_json::from_str(json).unwrap();
        let prev = event.data.previous_attributes.unwrap();
        assert_eq!(prev["status"], "past_due");
    }

    #[test]
    fn missing_data_is_rejected() {
        let json = r#"{"id": "evt_1", "type": "customer.created", "created": 1}"#;
        assert!(serde_json::from_str::<StripeEvent>(json).is_err());
    }

    // ══════════════════════════════════════════════════════════════
    // Methods
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn occurred_at_uses_event_created_time() {
        let event = StripeEventBuilder::new().created(1_705_276_800).build();
        assert_eq!(event.occurred_at().as_unix(), 1_705_276_800);
    }

    #[test]
    fn deserialize_object_to_custom_type() {
        #[derive(Debug, Deserialize)]
        struct Customer {
            id: String,
            email: String,
        }

        let event = StripeEventBuilder::new()
            .object(json!({"id": "cus_1", "email": "a@example.com"}))
            .build();

        let customer: Customer = event.deserialize_object().unwrap();
        assert_eq!(customer.id, "cus_1");
        assert_eq!(customer.email, "a@example.com");
    }

    #[test]
    fn deserialize_object_fails_for_wrong_type() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Invoice {
            amount_due: i64,
        }

        let event = StripeEventBuilder::new().object(json!({"id": "cs_test"})).build();
        assert!(event.deserialize_object::<Invoice>().is_err());
    }

    // ══════════════════════════════════════════════════════════════
    // Event types
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn handled_types_roundtrip_through_strings() {
        for event_type in StripeEventType::HANDLED {
            assert_eq!(StripeEventType::parse(event_type.as_str()), event_type);
        }
    }

    #[test]
    fn unrecognised_type_is_unknown() {
        assert_eq!(
            StripeEventType::parse("invoice.upcoming"),
            StripeEventType::Unknown
        );
    }

    #[test]
    fn parsed_type_returns_correct_variant() {
        let event = StripeEventBuilder::new()
            .event_type("invoice.payment_failed")
            .build();

        assert_eq!(event.parsed_type(), StripeEventType::InvoicePaymentFailed);
    }
}
