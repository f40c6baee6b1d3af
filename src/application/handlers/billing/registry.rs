//! Dispatch table from event type to handler.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::billing::StripeEventType;

use super::checkout_completed::CheckoutCompletedHandler;
use super::customer_events::CustomerLinkHandler;
use super::invoice_events::{PaymentFailedHandler, PaymentSucceededHandler};
use super::payment_method_events::PaymentMethodHandler;
use super::processor::{WebhookDispatcher, WebhookEventHandler};
use super::subscription_events::{
    SubscriptionDeletedHandler, SubscriptionUpsertHandler, TrialWillEndHandler,
};
use super::BillingServices;

/// Routes each event type to the one handler registered for it.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<StripeEventType, Arc<dyn WebhookEventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every handled event type wired to its handler.
    pub fn standard(services: BillingServices) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CustomerLinkHandler::new(services.clone())));
        registry.register(Arc::new(CheckoutCompletedHandler::new(services.clone())));
        registry.register(Arc::new(SubscriptionUpsertHandler::new(services.clone())));
        registry.register(Arc::new(SubscriptionDeletedHandler::new(services.clone())));
        registry.register(Arc::new(TrialWillEndHandler));
        registry.register(Arc::new(PaymentSucceededHandler::new(services.clone())));
        registry.register(Arc::new(PaymentFailedHandler::new(services.clone())));
        registry.register(Arc::new(PaymentMethodHandler::new(services)));
        registry
    }

    /// Registers `handler` for every type it declares, replacing earlier ones.
    pub fn register(&mut self, handler: Arc<dyn WebhookEventHandler>) {
        for event_type in handler.handles() {
            self.handlers.insert(event_type, Arc::clone(&handler));
        }
    }

    pub fn handled_types(&self) -> Vec<StripeEventType> {
        self.handlers.keys().copied().collect()
    }
}

#[async_trait]
impl WebhookDispatcher for HandlerRegistry {
    fn get_handler(&self, event_type: &StripeEventType) -> Option<&dyn WebhookEventHandler> {
        self.handlers.get(event_type).map(|h| h.as_ref())
    }
}
