//! CommissionRepository port - immutable influencer commission rows.
//!
//! At most one row exists per (user, milestone). Implementations enforce
//! this with a unique constraint and insert-if-absent, so a replayed event
//! can never pay a milestone twice.

use async_trait::async_trait;

use crate::domain::billing::{CommissionInsert, InfluencerCommission};
use crate::domain::foundation::{DomainError, UserId};

#[async_trait]
pub trait CommissionRepository: Send + Sync {
    async fn insert_if_absent(
        &self,
        commission: &InfluencerCommission,
    ) -> Result<CommissionInsert, DomainError>;

    async fn list_for_user(&self, user_id: &UserId)
        -> Result<Vec<InfluencerCommission>, DomainError>;
}
