//! Collaborators shared by every billing event handler.

use std::sync::Arc;

use crate::domain::billing::{CommissionSchedule, StatusMapper};
use crate::ports::{BillingProvider, CommissionRepository, ProfileStore, PromoCodeRepository};

/// Ports and policy tables the handlers run against.
///
/// Cloning is cheap; every field is shared.
#[derive(Clone)]
pub struct BillingServices {
    pub profiles: Arc<dyn ProfileStore>,
    pub promo_codes: Arc<dyn PromoCodeRepository>,
    pub commissions: Arc<dyn CommissionRepository>,
    pub provider: Arc<dyn BillingProvider>,
    pub mapper: Arc<StatusMapper>,
    pub schedule: CommissionSchedule,
}

impl BillingServices {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        promo_codes: Arc<dyn PromoCodeRepository>,
        commissions: Arc<dyn CommissionRepository>,
        provider: Arc<dyn BillingProvider>,
        mapper: StatusMapper,
        schedule: CommissionSchedule,
    ) -> Self {
        Self {
            profiles,
            promo_codes,
            commissions,
            provider,
            mapper: Arc::new(mapper),
            schedule,
        }
    }
}
