//! PostgreSQL implementation of CommissionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{CommissionInsert, InfluencerCommission, Milestone};
use crate::domain::foundation::{CommissionId, DomainError, ErrorCode, PromoCodeId, Timestamp, UserId};
use crate::ports::CommissionRepository;

/// PostgreSQL implementation of the CommissionRepository port.
///
/// `UNIQUE (user_id, milestone)` plus `ON CONFLICT DO NOTHING` makes every
/// insert idempotent.
#[derive(Clone)]
pub struct PostgresCommissionRepository {
    pool: PgPool,
}

impl PostgresCommissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommissionRow {
    id: Uuid,
    user_id: Uuid,
    promo_code_id: Uuid,
    milestone: String,
    amount: i64,
    eligible_at: DateTime<Utc>,
}

impl TryFrom<CommissionRow> for InfluencerCommission {
    type Error = DomainError;

    fn try_from(row: CommissionRow) -> Result<Self, Self::Error> {
        let milestone: Milestone = row.milestone.parse().map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid milestone value: {}", e),
            )
        })?;

        Ok(InfluencerCommission {
            id: CommissionId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            promo_code_id: PromoCodeId::from_uuid(row.promo_code_id),
            milestone,
            amount: row.amount,
            eligible_at: Timestamp::from_datetime(row.eligible_at),
        })
    }
}

#[async_trait]
impl CommissionRepository for PostgresCommissionRepository {
    async fn insert_if_absent(
        &self,
        commission: &InfluencerCommission,
    ) -> Result<CommissionInsert, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO influencer_commissions
                (id, user_id, promo_code_id, milestone, amount, eligible_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, milestone) DO NOTHING
            "#,
        )
        .bind(commission.id.as_uuid())
        .bind(commission.user_id.as_uuid())
        .bind(commission.promo_code_id.as_uuid())
        .bind(commission.milestone.as_str())
        .bind(commission.amount)
        .bind(commission.eligible_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to insert commission", e))?;

        Ok(if result.rows_affected() > 0 {
            CommissionInsert::Inserted
        } else {
            CommissionInsert::AlreadyExists
        })
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<InfluencerCommission>, DomainError> {
        let rows: Vec<CommissionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, promo_code_id, milestone, amount, eligible_at
            FROM influencer_commissions
            WHERE user_id = $1
            ORDER BY eligible_at ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to list commissions", e))?;

        rows.into_iter().map(InfluencerCommission::try_from).collect()
    }
}
