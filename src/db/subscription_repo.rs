// src/db/subscription_repo.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::subscription::{PlanType, Subscription},
};

#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_pending(
        &self,
        user_id: &str,
        plan_type: PlanType,
        amount: Decimal,
    ) -> Result<Subscription, AppError> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (user_id, plan_type, amount)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(plan_type)
        .bind(amount)
        .fetch_one(&self.pool)
        .await?;

        Ok(subscription)
    }

    pub async fn find(&self, subscription_id: Uuid) -> Result<Option<Subscription>, AppError> {
        let subscription =
            sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE id = $1")
                .bind(subscription_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(subscription)
    }

    pub async fn find_for_update<'e, E>(
        &self,
        executor: E,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE id = $1 FOR UPDATE",
        )
        .bind(subscription_id)
        .fetch_optional(executor)
        .await?;

        Ok(subscription)
    }

    /// Latest subscription still marked active for the tenant. The caller
    /// decides whether it has lapsed.
    pub async fn find_latest_active(&self, user_id: &str) -> Result<Option<Subscription>, AppError> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT * FROM subscriptions
            WHERE user_id = $1 AND status = 'active'
            ORDER BY end_date DESC NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    /// Closes every other active subscription of the tenant and returns
    /// them as they were before the update.
    pub async fn supersede_active<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        keep_id: Uuid,
    ) -> Result<Vec<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let superseded = sqlx::query_as::<_, Subscription>(
            r#"
            WITH closed AS (
                SELECT * FROM subscriptions
                WHERE user_id = $1 AND status = 'active' AND id <> $2
                FOR UPDATE
            ),
            updated AS (
                UPDATE subscriptions s SET status = 'expired', updated_at = now()
                FROM closed
                WHERE s.id = closed.id
            )
            SELECT * FROM closed
            "#,
        )
        .bind(user_id)
        .bind(keep_id)
        .fetch_all(executor)
        .await?;

        Ok(superseded)
    }

    pub async fn activate<'e, E>(
        &self,
        executor: E,
        subscription_id: Uuid,
        transaction_id: &str,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET status = 'active', transaction_id = $2, start_date = $3, end_date = $4,
                updated_at = now()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(subscription_id)
        .bind(transaction_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_optional(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::StateConflict(
                        "Another subscription was activated for this account at the same time".into(),
                    );
                }
            }
            e.into()
        })?;

        Ok(subscription)
    }

    pub async fn cancel<'e, E>(
        &self,
        executor: E,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions SET status = 'cancelled', updated_at = now()
            WHERE id = $1 AND status IN ('pending', 'active')
            RETURNING *
            "#,
        )
        .bind(subscription_id)
        .fetch_optional(executor)
        .await?;

        Ok(subscription)
    }
}
