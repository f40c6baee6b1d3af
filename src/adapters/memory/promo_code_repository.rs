//! In-memory promo code and usage store.
//!
//! Codes and usage rows share one lock so that recording a subscription
//! start and bumping the counter happen together.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::{PromoCode, PromoCodeUsage, UsageOutcome};
use crate::domain::foundation::{DomainError, ErrorCode, PromoCodeId, Timestamp, UserId};
use crate::ports::PromoCodeRepository;

#[derive(Default)]
struct PromoState {
    codes: HashMap<PromoCodeId, PromoCode>,
    usages: Vec<PromoCodeUsage>,
}

#[derive(Clone, Default)]
pub struct InMemoryPromoCodeRepository {
    state: Arc<RwLock<PromoState>>,
}

impl InMemoryPromoCodeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_code(&self, code: PromoCode) {
        self.state.write().await.codes.insert(code.id, code);
    }

    /// All usage rows for a user.
    pub async fn usages_for(&self, user_id: &UserId) -> Vec<PromoCodeUsage> {
        self.state
            .read()
            .await
            .usages
            .iter()
            .filter(|u| &u.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PromoCodeRepository for InMemoryPromoCodeRepository {
    async fn find_by_stripe_id(&self, stripe_id: &str) -> Result<Option<PromoCode>, DomainError> {
        Ok(self
            .state
            .read()
            .await
            .codes
            .values()
            .find(|c| c.stripe_promotion_code_id.as_deref() == Some(stripe_id))
            .cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCode>, DomainError> {
        Ok(self
            .state
            .read()
            .await
            .codes
            .values()
            .find(|c| c.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn find_by_id(&self, id: &PromoCodeId) -> Result<Option<PromoCode>, DomainError> {
        Ok(self.state.read().await.codes.get(id).cloned())
    }

    async fn record_subscription_start(
        &self,
        user_id: &UserId,
        promo_code_id: &PromoCodeId,
        at: Timestamp,
    ) -> Result<UsageOutcome, DomainError> {
        let mut state = self.state.write().await;
        if !state.codes.contains_key(promo_code_id) {
            return Err(DomainError::new(
                ErrorCode::PromoCodeNotFound,
                format!("Promo code {} does not exist", promo_code_id),
            ));
        }

        let index = match state
            .usages
            .iter()
            .position(|u| &u.user_id == user_id && &u.promo_code_id == promo_code_id)
        {
            Some(index) => index,
            None => {
                state
                    .usages
                    .push(PromoCodeUsage::new(*user_id, *promo_code_id, at));
                state.usages.len() - 1
            }
        };

        let usage = &mut state.usages[index];
        if at.is_before(&usage.applied_at) {
            usage.applied_at = at;
        }
        if usage.subscription_started_at.is_some() {
            return Ok(UsageOutcome::AlreadyStarted);
        }
        usage.subscription_started_at = Some(at);

        if let Some(code) = state.codes.get_mut(promo_code_id) {
            code.usage_count += 1;
        }
        Ok(UsageOutcome::Started)
    }

    async fn mark_first_payment(
        &self,
        user_id: &UserId,
        at: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        let mut changed = false;
        for usage in state
            .usages
            .iter_mut()
            .filter(|u| &u.user_id == user_id && u.first_payment_at.is_none())
        {
            usage.first_payment_at = Some(at);
            changed = true;
        }
        Ok(changed)
    }

    async fn mark_churned(&self, user_id: &UserId, at: Timestamp) -> Result<u64, DomainError> {
        let mut state = self.state.write().await;
        let mut count = 0;
        for usage in state
            .usages
            .iter_mut()
            .filter(|u| &u.user_id == user_id && u.churned_at.is_none())
        {
            usage.churned_at = Some(at);
            count += 1;
        }
        Ok(count)
    }

    async fn find_usage_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PromoCodeUsage>, DomainError> {
        Ok(self
            .state
            .read()
            .await
            .usages
            .iter()
            .filter(|u| &u.user_id == user_id)
            .min_by_key(|u| u.applied_at)
            .cloned())
    }
}
