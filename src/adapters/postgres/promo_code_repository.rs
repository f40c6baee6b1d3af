//! PostgreSQL implementation of PromoCodeRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{PromoCode, PromoCodeUsage, PromoTier, UsageOutcome};
use crate::domain::foundation::{DomainError, ErrorCode, PromoCodeId, Timestamp, UserId};
use crate::ports::PromoCodeRepository;

/// PostgreSQL implementation of the PromoCodeRepository port.
#[derive(Clone)]
pub struct PostgresPromoCodeRepository {
    pool: PgPool,
}

impl PostgresPromoCodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PromoCodeRow {
    id: Uuid,
    code: String,
    stripe_promotion_code_id: Option<String>,
    tier: String,
    usage_count: i64,
}

impl TryFrom<PromoCodeRow> for PromoCode {
    type Error = DomainError;

    fn try_from(row: PromoCodeRow) -> Result<Self, Self::Error> {
        let tier: PromoTier = row.tier.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid tier value: {}", e))
        })?;

        Ok(PromoCode {
            id: PromoCodeId::from_uuid(row.id),
            code: row.code,
            stripe_promotion_code_id: row.stripe_promotion_code_id,
            tier,
            usage_count: row.usage_count,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UsageRow {
    user_id: Uuid,
    promo_code_id: Uuid,
    applied_at: DateTime<Utc>,
    subscription_started_at: Option<DateTime<Utc>>,
    first_payment_at: Option<DateTime<Utc>>,
    churned_at: Option<DateTime<Utc>>,
}

impl From<UsageRow> for PromoCodeUsage {
    fn from(row: UsageRow) -> Self {
        Self {
            user_id: UserId::from_uuid(row.user_id),
            promo_code_id: PromoCodeId::from_uuid(row.promo_code_id),
            applied_at: Timestamp::from_datetime(row.applied_at),
            subscription_started_at: row.subscription_started_at.map(Timestamp::from_datetime),
            first_payment_at: row.first_payment_at.map(Timestamp::from_datetime),
            churned_at: row.churned_at.map(Timestamp::from_datetime),
        }
    }
}

#[async_trait]
impl PromoCodeRepository for PostgresPromoCodeRepository {
    async fn find_by_stripe_id(&self, stripe_id: &str) -> Result<Option<PromoCode>, DomainError> {
        let row: Option<PromoCodeRow> = sqlx::query_as(
            r#"
            SELECT id, code, stripe_promotion_code_id, tier, usage_count
            FROM promo_codes
            WHERE stripe_promotion_code_id = $1
            "#,
        )
        .bind(stripe_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load promo code", e))?;

        row.map(PromoCode::try_from).transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCode>, DomainError> {
        let row: Option<PromoCodeRow> = sqlx::query_as(
            r#"
            SELECT id, code, stripe_promotion_code_id, tier, usage_count
            FROM promo_codes
            WHERE lower(code) = lower($1)
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load promo code", e))?;

        row.map(PromoCode::try_from).transpose()
    }

    async fn find_by_id(&self, id: &PromoCodeId) -> Result<Option<PromoCode>, DomainError> {
        let row: Option<PromoCodeRow> = sqlx::query_as(
            r#"
            SELECT id, code, stripe_promotion_code_id, tier, usage_count
            FROM promo_codes
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load promo code", e))?;

        row.map(PromoCode::try_from).transpose()
    }

    async fn record_subscription_start(
        &self,
        user_id: &UserId,
        promo_code_id: &PromoCodeId,
        at: Timestamp,
    ) -> Result<UsageOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM promo_codes WHERE id = $1)")
            .bind(promo_code_id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| DomainError::database("Failed to load promo code", e))?;
        if !exists {
            return Err(DomainError::new(
                ErrorCode::PromoCodeNotFound,
                format!("Promo code {} does not exist", promo_code_id),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO promo_code_usage (user_id, promo_code_id, applied_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, promo_code_id)
            DO UPDATE SET applied_at = LEAST(promo_code_usage.applied_at, EXCLUDED.applied_at)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(promo_code_id.as_uuid())
        .bind(at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to upsert promo code usage", e))?;

        // The row lock taken here serializes concurrent starts; only the
        // first one sees a NULL and counts the subscriber.
        let started = sqlx::query(
            r#"
            UPDATE promo_code_usage
            SET subscription_started_at = $3
            WHERE user_id = $1 AND promo_code_id = $2 AND subscription_started_at IS NULL
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(promo_code_id.as_uuid())
        .bind(at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to record subscription start", e))?
        .rows_affected()
            > 0;

        if started {
            sqlx::query("UPDATE promo_codes SET usage_count = usage_count + 1 WHERE id = $1")
                .bind(promo_code_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::database("Failed to increment usage count", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit promo code usage", e))?;

        Ok(if started {
            UsageOutcome::Started
        } else {
            UsageOutcome::AlreadyStarted
        })
    }

    async fn mark_first_payment(
        &self,
        user_id: &UserId,
        at: Timestamp,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE promo_code_usage
            SET first_payment_at = $2
            WHERE user_id = $1 AND first_payment_at IS NULL
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to record first payment", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_churned(&self, user_id: &UserId, at: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE promo_code_usage
            SET churned_at = $2
            WHERE user_id = $1 AND churned_at IS NULL
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to record churn", e))?;

        Ok(result.rows_affected())
    }

    async fn find_usage_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PromoCodeUsage>, DomainError> {
        let row: Option<UsageRow> = sqlx::query_as(
            r#"
            SELECT user_id, promo_code_id, applied_at, subscription_started_at,
                   first_payment_at, churned_at
            FROM promo_code_usage
            WHERE user_id = $1
            ORDER BY applied_at ASC
            LIMIT 1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load promo code usage", e))?;

        Ok(row.map(PromoCodeUsage::from))
    }
}
