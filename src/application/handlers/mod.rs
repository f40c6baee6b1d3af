//! Application handlers.
//!
//! Event handlers that orchestrate domain operations over the ports.

pub mod billing;

pub use billing::{
    BillingServices, HandlerRegistry, IdempotentWebhookProcessor, StripeReconciler,
    WebhookDispatcher, WebhookEventHandler,
};
