//! Billing webhook handlers.
//!
//! Reconciles Stripe lifecycle events onto customer profiles, promo usage and
//! influencer commissions.
//!
//! # Pipeline
//!
//! `StripeReconciler::handle` verifies the signature, parses the event and
//! hands it to `IdempotentWebhookProcessor`, which logs it, dispatches
//! through `HandlerRegistry` and marks it processed.
//!
//! # Handlers
//!
//! | Event | Handler |
//! |---|---|
//! | `customer.created`, `customer.updated` | `CustomerLinkHandler` |
//! | `checkout.session.completed` | `CheckoutCompletedHandler` |
//! | `customer.subscription.created`, `.updated` | `SubscriptionUpsertHandler` |
//! | `customer.subscription.deleted` | `SubscriptionDeletedHandler` |
//! | `customer.subscription.trial_will_end` | `TrialWillEndHandler` |
//! | `invoice.payment_succeeded` | `PaymentSucceededHandler` |
//! | `invoice.payment_failed` | `PaymentFailedHandler` |
//! | `payment_method.attached`, `.updated` | `PaymentMethodHandler` |

mod checkout_completed;
mod customer_events;
mod invoice_events;
mod payment_method;
mod payment_method_events;
mod processor;
mod promo_tracker;
mod reconciler;
mod registry;
mod services;
mod subscription_events;
mod subscription_sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use checkout_completed::CheckoutCompletedHandler;
pub use customer_events::CustomerLinkHandler;
pub use invoice_events::{PaymentFailedHandler, PaymentSucceededHandler};
pub use payment_method::{snapshot_of, PaymentMethodResolver};
pub use payment_method_events::PaymentMethodHandler;
pub use processor::{IdempotentWebhookProcessor, WebhookDispatcher, WebhookEventHandler};
pub use promo_tracker::{ConversionOutcome, MilestoneOutcome, PromoTracker};
pub use reconciler::StripeReconciler;
pub use registry::HandlerRegistry;
pub use services::BillingServices;
pub use subscription_events::{
    SubscriptionDeletedHandler, SubscriptionUpsertHandler, TrialWillEndHandler,
};
pub use subscription_sync::{SubscriptionSyncer, SyncOutcome};
