// src/db/usage_repo.rs

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{common::error::AppError, models::plan::Feature};

/// Counts what a tenant currently uses of each countable feature.
#[derive(Clone)]
pub struct UsageRepository {
    pool: PgPool,
}

impl UsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn count(&self, user_id: &str, feature: Feature) -> Result<u64, AppError> {
        let sql = match feature {
            Feature::Branches => "SELECT COUNT(*) FROM branches WHERE user_id = $1",
            Feature::Staff => "SELECT COUNT(*) FROM staff_members WHERE user_id = $1",
            Feature::Products => "SELECT COUNT(*) FROM products WHERE user_id = $1",
            Feature::Suppliers => "SELECT COUNT(*) FROM suppliers WHERE user_id = $1",
            Feature::Debtors => "SELECT COUNT(*) FROM debtors WHERE user_id = $1",
            Feature::DailySales | Feature::Reports => {
                return Err(AppError::InternalServerError(anyhow::anyhow!(
                    "{:?} usage is not a plain row count",
                    feature
                )));
            }
        };

        let count: i64 = sqlx::query_scalar(sql).bind(user_id).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    /// Sales recorded in `[from, to)`.
    pub async fn count_sales_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM stock_movements
            WHERE user_id = $1 AND movement_type = 'sale'
              AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }
}
