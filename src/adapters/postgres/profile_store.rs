//! PostgreSQL implementation of ProfileStore.
//!
//! Each write is one guarded UPDATE whose WHERE clause mirrors the rule on
//! [`CustomerProfile`]. When the guard rejects a row the profile is re-read
//! only to classify the outcome; nothing is written on that path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{
    CustomerProfile, LocalStatus, PaymentMethodSnapshot, Plan, PromoAttribution, SubscriptionEnd,
    SubscriptionSync, UpdateOutcome, CANCELED_STATUS,
};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::ProfileStore;

const PROFILE_COLUMNS: &str = r#"
    user_id, email, stripe_customer_id, created_at,
    subscription_status, subscription_plan, stripe_subscription_id, stripe_subscription_status,
    current_period_end, trial_end, cancel_at_period_end, locked_in_price, expires_at,
    card_brand, card_last4, promo_code_used, stripe_promotion_code_id,
    ended_subscription_ids, subscription_synced_at
"#;

/// PostgreSQL implementation of the ProfileStore port.
#[derive(Clone)]
pub struct PostgresProfileStore {
    pool: PgPool,
}

impl PostgresProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(
        &self,
        predicate: &str,
        key: &str,
    ) -> Result<Option<CustomerProfile>, DomainError> {
        let sql = format!("SELECT {} FROM profiles WHERE {}", PROFILE_COLUMNS, predicate);
        let row: Option<ProfileRow> = sqlx::query_as(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to load profile", e))?;

        row.map(CustomerProfile::try_from).transpose()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    user_id: Uuid,
    email: String,
    stripe_customer_id: Option<String>,
    created_at: DateTime<Utc>,
    subscription_status: String,
    subscription_plan: String,
    stripe_subscription_id: Option<String>,
    stripe_subscription_status: Option<String>,
    current_period_end: Option<DateTime<Utc>>,
    trial_end: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
    locked_in_price: Option<i64>,
    expires_at: Option<DateTime<Utc>>,
    card_brand: Option<String>,
    card_last4: Option<String>,
    promo_code_used: Option<String>,
    stripe_promotion_code_id: Option<String>,
    ended_subscription_ids: Vec<String>,
    subscription_synced_at: Option<DateTime<Utc>>,
}

impl TryFrom<ProfileRow> for CustomerProfile {
    type Error = DomainError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let subscription_status: LocalStatus = row.subscription_status.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid status value: {}", e))
        })?;
        let subscription_plan: Plan = row.subscription_plan.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid plan value: {}", e))
        })?;

        Ok(CustomerProfile {
            user_id: UserId::from_uuid(row.user_id),
            email: row.email,
            stripe_customer_id: row.stripe_customer_id,
            created_at: Timestamp::from_datetime(row.created_at),
            subscription_status,
            subscription_plan,
            stripe_subscription_id: row.stripe_subscription_id,
            stripe_subscription_status: row.stripe_subscription_status,
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            trial_end: row.trial_end.map(Timestamp::from_datetime),
            cancel_at_period_end: row.cancel_at_period_end,
            locked_in_price: row.locked_in_price,
            expires_at: row.expires_at.map(Timestamp::from_datetime),
            card_brand: row.card_brand,
            card_last4: row.card_last4,
            promo_code_used: row.promo_code_used,
            stripe_promotion_code_id: row.stripe_promotion_code_id,
            ended_subscription_ids: row.ended_subscription_ids,
            subscription_synced_at: row.subscription_synced_at.map(Timestamp::from_datetime),
        })
    }
}

fn to_datetime(ts: Option<Timestamp>) -> Option<DateTime<Utc>> {
    ts.map(|t| *t.as_datetime())
}

fn applied_or_not_found(rows_affected: u64) -> UpdateOutcome {
    if rows_affected > 0 {
        UpdateOutcome::Applied
    } else {
        UpdateOutcome::NotFound
    }
}

#[async_trait]
impl ProfileStore for PostgresProfileStore {
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<CustomerProfile>, DomainError> {
        let sql = format!("SELECT {} FROM profiles WHERE user_id = $1", PROFILE_COLUMNS);
        let row: Option<ProfileRow> = sqlx::query_as(&sql)
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to load profile", e))?;

        row.map(CustomerProfile::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<CustomerProfile>, DomainError> {
        self.find_one("lower(email) = lower($1)", email).await
    }

    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<CustomerProfile>, DomainError> {
        self.find_one("stripe_customer_id = $1", customer_id).await
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<CustomerProfile>, DomainError> {
        self.find_one("stripe_subscription_id = $1", subscription_id)
            .await
    }

    async fn link_customer_by_email(
        &self,
        email: &str,
        customer_id: &str,
    ) -> Result<UpdateOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET stripe_customer_id = $2, updated_at = now()
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .bind(customer_id)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to link Stripe customer", e))?;

        Ok(applied_or_not_found(result.rows_affected()))
    }

    async fn apply_subscription(
        &self,
        sync: &SubscriptionSync,
    ) -> Result<UpdateOutcome, DomainError> {
        let (card_brand, card_last4) = match &sync.payment_method {
            Some(pm) => (Some(pm.brand.as_str()), Some(pm.last4.as_str())),
            None => (None, None),
        };

        let result = sqlx::query(
            r#"
            UPDATE profiles SET
                stripe_subscription_id = $2,
                stripe_subscription_status = $3,
                subscription_status = $4,
                subscription_plan = $5,
                current_period_end = $6,
                trial_end = $7,
                cancel_at_period_end = $8,
                expires_at = $9,
                locked_in_price = COALESCE(locked_in_price, $10),
                card_brand = COALESCE($11, card_brand),
                card_last4 = COALESCE($12, card_last4),
                subscription_synced_at = GREATEST(subscription_synced_at, $14),
                updated_at = now()
            WHERE stripe_customer_id = $1
              AND NOT ($2 = ANY(ended_subscription_ids))
              AND (
                  stripe_subscription_id IS NULL
                  OR stripe_subscription_id = $2
                  OR ($13 AND (subscription_synced_at IS NULL OR subscription_synced_at <= $14))
              )
            "#,
        )
        .bind(&sync.customer_id)
        .bind(&sync.subscription_id)
        .bind(&sync.external_status)
        .bind(sync.status.as_str())
        .bind(sync.plan.as_str())
        .bind(to_datetime(sync.current_period_end))
        .bind(to_datetime(sync.trial_end))
        .bind(sync.cancel_at_period_end)
        .bind(to_datetime(sync.expires_at))
        .bind(sync.price_amount)
        .bind(card_brand)
        .bind(card_last4)
        .bind(sync.status.has_access())
        .bind(sync.occurred_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to apply subscription", e))?;

        if result.rows_affected() > 0 {
            return Ok(UpdateOutcome::Applied);
        }

        Ok(match self.find_by_customer_id(&sync.customer_id).await? {
            None => UpdateOutcome::NotFound,
            Some(profile) if profile.is_ended(&sync.subscription_id) => UpdateOutcome::SkippedEnded,
            Some(_) => UpdateOutcome::SkippedStale,
        })
    }

    async fn end_subscription(&self, end: &SubscriptionEnd) -> Result<UpdateOutcome, DomainError> {
        // The id is tombstoned even when the profile has moved on, so a late
        // update for it can never be applied.
        let is_current: Option<bool> = sqlx::query_scalar(
            r#"
            UPDATE profiles p SET
                ended_subscription_ids = CASE
                    WHEN $2 = ANY(p.ended_subscription_ids) THEN p.ended_subscription_ids
                    ELSE array_append(p.ended_subscription_ids, $2)
                END,
                stripe_subscription_id = CASE WHEN c.is_current THEN $2 ELSE p.stripe_subscription_id END,
                stripe_subscription_status = CASE WHEN c.is_current THEN $3 ELSE p.stripe_subscription_status END,
                subscription_status = CASE WHEN c.is_current THEN $4 ELSE p.subscription_status END,
                subscription_plan = CASE WHEN c.is_current THEN $5 ELSE p.subscription_plan END,
                current_period_end = CASE WHEN c.is_current THEN NULL ELSE p.current_period_end END,
                trial_end = CASE WHEN c.is_current THEN NULL ELSE p.trial_end END,
                cancel_at_period_end = CASE WHEN c.is_current THEN FALSE ELSE p.cancel_at_period_end END,
                expires_at = CASE WHEN c.is_current THEN $6 ELSE p.expires_at END,
                subscription_synced_at = CASE
                    WHEN c.is_current THEN GREATEST(p.subscription_synced_at, $6)
                    ELSE p.subscription_synced_at
                END,
                updated_at = now()
            FROM (
                SELECT user_id,
                       (stripe_subscription_id IS NULL OR stripe_subscription_id = $2) AS is_current
                FROM profiles
                WHERE stripe_customer_id = $1
            ) c
            WHERE p.user_id = c.user_id
            RETURNING c.is_current
            "#,
        )
        .bind(&end.customer_id)
        .bind(&end.subscription_id)
        .bind(CANCELED_STATUS)
        .bind(end.status.as_str())
        .bind(end.plan.as_str())
        .bind(end.ended_at.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to end subscription", e))?;

        Ok(match is_current {
            None => UpdateOutcome::NotFound,
            Some(true) => UpdateOutcome::Applied,
            Some(false) => UpdateOutcome::SkippedStale,
        })
    }

    async fn set_status_by_subscription(
        &self,
        subscription_id: &str,
        status: LocalStatus,
    ) -> Result<UpdateOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET subscription_status = $2, updated_at = now()
            WHERE stripe_subscription_id = $1
              AND NOT ($1 = ANY(ended_subscription_ids))
            "#,
        )
        .bind(subscription_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to update subscription status", e))?;

        if result.rows_affected() > 0 {
            return Ok(UpdateOutcome::Applied);
        }

        Ok(match self.find_by_subscription_id(subscription_id).await? {
            None => UpdateOutcome::NotFound,
            Some(_) => UpdateOutcome::SkippedEnded,
        })
    }

    async fn update_payment_method_by_customer(
        &self,
        customer_id: &str,
        snapshot: &PaymentMethodSnapshot,
    ) -> Result<UpdateOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET card_brand = $2, card_last4 = $3, updated_at = now()
            WHERE stripe_customer_id = $1
            "#,
        )
        .bind(customer_id)
        .bind(&snapshot.brand)
        .bind(&snapshot.last4)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to update payment method", e))?;

        Ok(applied_or_not_found(result.rows_affected()))
    }

    async fn set_promo_attribution(
        &self,
        user_id: &UserId,
        attribution: &PromoAttribution,
    ) -> Result<UpdateOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE profiles SET
                promo_code_used = COALESCE(promo_code_used, $2),
                stripe_promotion_code_id = COALESCE(stripe_promotion_code_id, $3),
                updated_at = now()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(&attribution.code)
        .bind(&attribution.stripe_promotion_code_id)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to record promo attribution", e))?;

        Ok(applied_or_not_found(result.rows_affected()))
    }
}
