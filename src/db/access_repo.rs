// src/db/access_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::access::{StaffMember, StaffStatus},
};

#[derive(Clone)]
pub struct AccessRepository {
    pool: PgPool,
}

impl AccessRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_staff_by_auth_id(&self, auth_id: &str) -> Result<Option<StaffMember>, AppError> {
        let staff = sqlx::query_as::<_, StaffMember>("SELECT * FROM staff_members WHERE auth_id = $1 AND accepted_at IS NOT NULL")
            .bind(auth_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(staff)
    }

    /// Whether `auth_id` already runs a business of its own: any tenant
    /// row, staff or subscription recorded under it.
    pub async fn owns_tenant_data(&self, auth_id: &str) -> Result<bool, AppError> {
        let owns: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM branches WHERE user_id = $1)
                OR EXISTS (SELECT 1 FROM products WHERE user_id = $1)
                OR EXISTS (SELECT 1 FROM suppliers WHERE user_id = $1)
                OR EXISTS (SELECT 1 FROM debtors WHERE user_id = $1)
                OR EXISTS (SELECT 1 FROM staff_members WHERE user_id = $1)
                OR EXISTS (SELECT 1 FROM stock_levels WHERE user_id = $1)
                OR EXISTS (SELECT 1 FROM stock_movements WHERE user_id = $1)
                OR EXISTS (SELECT 1 FROM stock_audits WHERE user_id = $1)
                OR EXISTS (SELECT 1 FROM branch_transfers WHERE user_id = $1)
                OR EXISTS (SELECT 1 FROM purchase_orders WHERE user_id = $1)
                OR EXISTS (SELECT 1 FROM subscriptions WHERE user_id = $1)
            "#,
        )
        .bind(auth_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(owns)
    }

    pub async fn create_staff(
        &self,
        user_id: &str,
        auth_id: &str,
        full_name: &str,
        role: &str,
        permissions: &[String],
    ) -> Result<StaffMember, AppError> {
        sqlx::query_as::<_, StaffMember>(
            r#"
            INSERT INTO staff_members (user_id, auth_id, full_name, role, permissions)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(auth_id)
        .bind(full_name)
        .bind(role)
        .bind(permissions)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::invalid(format!(
                        "authId '{}' is already invited to this business",
                        auth_id
                    ));
                }
            }
            e.into()
        })
    }

    /// Marks a pending invitation addressed to `auth_id` as accepted.
    pub async fn accept_invitation(
        &self,
        staff_id: Uuid,
        auth_id: &str,
    ) -> Result<Option<StaffMember>, AppError> {
        sqlx::query_as::<_, StaffMember>(
            r#"
            UPDATE staff_members SET accepted_at = now(), updated_at = now()
            WHERE id = $1 AND auth_id = $2 AND accepted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(staff_id)
        .bind(auth_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::StateConflict("You already work for another business".into());
                }
            }
            e.into()
        })
    }

    pub async fn set_staff_status(
        &self,
        user_id: &str,
        staff_id: Uuid,
        status: StaffStatus,
    ) -> Result<Option<StaffMember>, AppError> {
        let staff = sqlx::query_as::<_, StaffMember>(
            r#"
            UPDATE staff_members SET status = $3, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(staff_id)
        .bind(user_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(staff)
    }
}
