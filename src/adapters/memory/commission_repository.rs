//! In-memory commission store.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::{CommissionInsert, InfluencerCommission};
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::CommissionRepository;

#[derive(Clone, Default)]
pub struct InMemoryCommissionRepository {
    rows: Arc<RwLock<Vec<InfluencerCommission>>>,
}

impl InMemoryCommissionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl CommissionRepository for InMemoryCommissionRepository {
    async fn insert_if_absent(
        &self,
        commission: &InfluencerCommission,
    ) -> Result<CommissionInsert, DomainError> {
        let mut rows = self.rows.write().await;
        let exists = rows
            .iter()
            .any(|r| r.user_id == commission.user_id && r.milestone == commission.milestone);
        if exists {
            return Ok(CommissionInsert::AlreadyExists);
        }
        rows.push(commission.clone());
        Ok(CommissionInsert::Inserted)
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<InfluencerCommission>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect())
    }
}
