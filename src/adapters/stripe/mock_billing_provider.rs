//! Mock billing provider for testing.
//!
//! Provides a configurable in-memory implementation of `BillingProvider` for
//! unit and integration tests. Supports:
//! - Pre-configured Stripe objects
//! - Error injection per method
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::billing::stripe_objects::{
    StripeCustomer, StripeInvoice, StripePaymentMethod, StripePromotionCode, StripeSubscription,
};
use crate::ports::{BillingProvider, ProviderError};

/// Mock billing provider.
///
/// # Example
///
/// ```ignore
/// let mock = MockBillingProvider::new();
/// mock.add_customer(customer);
/// mock.set_method_error("get_subscription", ProviderError::network("down"));
/// ```
#[derive(Clone, Default)]
pub struct MockBillingProvider {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    customers: HashMap<String, StripeCustomer>,
    subscriptions: HashMap<String, StripeSubscription>,
    invoices: HashMap<String, StripeInvoice>,
    payment_methods: HashMap<String, StripePaymentMethod>,
    promotion_codes: HashMap<String, StripePromotionCode>,

    /// Specific errors by method name.
    method_errors: HashMap<String, ProviderError>,

    /// Track method calls for assertions.
    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: String,
    pub id: String,
}

impl MockBillingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    pub fn add_customer(&self, customer: StripeCustomer) {
        self.state().customers.insert(customer.id.clone(), customer);
    }

    pub fn add_subscription(&self, subscription: StripeSubscription) {
        self.state()
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    pub fn add_invoice(&self, invoice: StripeInvoice) {
        self.state().invoices.insert(invoice.id.clone(), invoice);
    }

    pub fn add_payment_method(&self, payment_method: StripePaymentMethod) {
        self.state()
            .payment_methods
            .insert(payment_method.id.clone(), payment_method);
    }

    pub fn add_promotion_code(&self, promotion_code: StripePromotionCode) {
        self.state()
            .promotion_codes
            .insert(promotion_code.id.clone(), promotion_code);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: ProviderError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        self.state().method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    /// Get count of calls to a method.
    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    /// Records the call and returns the configured error, if any.
    fn enter(&self, method: &str, id: &str) -> Result<MutexGuard<'_, MockState>, ProviderError> {
        let mut state = self.state();
        state.call_log.push(MethodCall {
            method: method.to_string(),
            id: id.to_string(),
        });
        let error = state.method_errors.get(method).cloned();
        match error {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }
}

#[async_trait]
impl BillingProvider for MockBillingProvider {
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<StripeSubscription>, ProviderError> {
        let state = self.enter("get_subscription", subscription_id)?;
        Ok(state.subscriptions.get(subscription_id).cloned())
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<Option<StripeInvoice>, ProviderError> {
        let state = self.enter("get_invoice", invoice_id)?;
        Ok(state.invoices.get(invoice_id).cloned())
    }

    async fn get_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<Option<StripePaymentMethod>, ProviderError> {
        let state = self.enter("get_payment_method", payment_method_id)?;
        Ok(state.payment_methods.get(payment_method_id).cloned())
    }

    async fn get_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<StripeCustomer>, ProviderError> {
        let state = self.enter("get_customer", customer_id)?;
        Ok(state
            .customers
            .get(customer_id)
            .filter(|c| !c.deleted)
            .cloned())
    }

    async fn get_promotion_code(
        &self,
        promotion_code_id: &str,
    ) -> Result<Option<StripePromotionCode>, ProviderError> {
        let state = self.enter("get_promotion_code", promotion_code_id)?;
        Ok(state.promotion_codes.get(promotion_code_id).cloned())
    }
}
