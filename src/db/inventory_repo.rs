// src/db/inventory_repo.rs

use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::inventory::{
        AlertStatus, AlertType, MovementFilter, NewMovement, StockAlert, StockAudit,
        StockAuditItem, StockLevel, StockLevelFilter, StockMovement,
    },
};

#[derive(Clone)]
pub struct InventoryRepository {
    pool: PgPool,
}

impl InventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Stock levels
    // ---

    pub async fn get_stock_level<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        product_id: Uuid,
        branch_id: Uuid,
    ) -> Result<Option<StockLevel>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let level = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT * FROM stock_levels
            WHERE user_id = $1 AND product_id = $2 AND branch_id = $3
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(branch_id)
        .fetch_optional(executor)
        .await?;

        Ok(level)
    }

    /// Same as `get_stock_level` but holds a row lock until the transaction ends.
    /// Every read-modify-write on a stock level goes through here.
    pub async fn get_stock_level_for_update<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        product_id: Uuid,
        branch_id: Uuid,
    ) -> Result<Option<StockLevel>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let level = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT * FROM stock_levels
            WHERE user_id = $1 AND product_id = $2 AND branch_id = $3
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(branch_id)
        .fetch_optional(executor)
        .await?;

        Ok(level)
    }

    pub async fn list_stock_levels<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        filter: &StockLevelFilter,
    ) -> Result<Vec<StockLevel>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM stock_levels WHERE user_id = ");
        qb.push_bind(user_id);

        if let Some(branch_id) = filter.branch_id {
            qb.push(" AND branch_id = ").push_bind(branch_id);
        }
        if let Some(product_ids) = &filter.product_ids {
            qb.push(" AND product_id = ANY(").push_bind(product_ids.clone()).push(")");
        }
        if filter.low_stock_only {
            qb.push(" AND current_stock <= reorder_point");
        }
        qb.push(" ORDER BY branch_id, product_id");

        let levels = qb.build_query_as::<StockLevel>().fetch_all(executor).await?;
        Ok(levels)
    }

    /// Creates the level if the product has none at the branch yet.
    /// Returns `None` when one already exists.
    pub async fn insert_stock_level<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        product_id: Uuid,
        branch_id: Uuid,
        current_stock: i32,
        reorder_point: i32,
        reorder_quantity: i32,
    ) -> Result<Option<StockLevel>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let level = sqlx::query_as::<_, StockLevel>(
            r#"
            INSERT INTO stock_levels
                (user_id, product_id, branch_id, current_stock, reorder_point, reorder_quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, product_id, branch_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(branch_id)
        .bind(current_stock)
        .bind(reorder_point)
        .bind(reorder_quantity)
        .fetch_optional(executor)
        .await?;

        Ok(level)
    }

    /// Upsert that adds `delta` to the on-hand quantity. Only used for
    /// increments; decrements go through a locked read + `set_stock`.
    pub async fn increment_stock<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        product_id: Uuid,
        branch_id: Uuid,
        delta: i32,
    ) -> Result<StockLevel, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let level = sqlx::query_as::<_, StockLevel>(
            r#"
            INSERT INTO stock_levels (user_id, product_id, branch_id, current_stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id, branch_id)
            DO UPDATE SET
                current_stock = stock_levels.current_stock + EXCLUDED.current_stock,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(branch_id)
        .bind(delta)
        .fetch_one(executor)
        .await?;

        Ok(level)
    }

    pub async fn set_stock<'e, E>(
        &self,
        executor: E,
        level_id: Uuid,
        current_stock: i32,
        reserved_stock: i32,
    ) -> Result<StockLevel, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let level = sqlx::query_as::<_, StockLevel>(
            r#"
            UPDATE stock_levels
            SET current_stock = $2, reserved_stock = $3, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(level_id)
        .bind(current_stock)
        .bind(reserved_stock)
        .fetch_one(executor)
        .await?;

        Ok(level)
    }

    // ---
    // Movements
    // ---

    pub async fn record_movement<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        movement: &NewMovement<'_>,
    ) -> Result<StockMovement, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let recorded = sqlx::query_as::<_, StockMovement>(
            r#"
            INSERT INTO stock_movements
                (user_id, product_id, branch_id, quantity, movement_type, reason, reference_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(movement.product_id)
        .bind(movement.branch_id)
        .bind(movement.quantity)
        .bind(movement.movement_type)
        .bind(movement.reason)
        .bind(movement.reference_id)
        .fetch_one(executor)
        .await?;

        Ok(recorded)
    }

    pub async fn list_movements(
        &self,
        user_id: &str,
        filter: &MovementFilter,
    ) -> Result<Vec<StockMovement>, AppError> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT * FROM stock_movements WHERE user_id = ");
        qb.push_bind(user_id);

        if let Some(branch_id) = filter.branch_id {
            qb.push(" AND branch_id = ").push_bind(branch_id);
        }
        if let Some(product_id) = filter.product_id {
            qb.push(" AND product_id = ").push_bind(product_id);
        }
        if let Some(movement_type) = filter.movement_type {
            qb.push(" AND movement_type = ").push_bind(movement_type);
        }
        qb.push(" ORDER BY created_at DESC LIMIT ").push_bind(filter.limit);

        let movements = qb.build_query_as::<StockMovement>().fetch_all(&self.pool).await?;
        Ok(movements)
    }

    // ---
    // Alerts
    // ---

    /// Inserts an active alert unless one is already open for the same
    /// product, branch and type.
    pub async fn insert_alert_if_absent<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        level: &StockLevel,
        alert_type: AlertType,
    ) -> Result<Option<StockAlert>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let alert = sqlx::query_as::<_, StockAlert>(
            r#"
            INSERT INTO stock_alerts
                (user_id, product_id, branch_id, alert_type, current_stock, reorder_point)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, product_id, branch_id, alert_type) WHERE status = 'active'
            DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(level.product_id)
        .bind(level.branch_id)
        .bind(alert_type)
        .bind(level.current_stock)
        .bind(level.reorder_point)
        .fetch_optional(executor)
        .await?;

        Ok(alert)
    }

    pub async fn list_active_alerts<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        branch_id: Option<Uuid>,
        alert_type: AlertType,
    ) -> Result<Vec<StockAlert>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM stock_alerts WHERE user_id = ");
        qb.push_bind(user_id);
        qb.push(" AND status = ").push_bind(AlertStatus::Active);
        qb.push(" AND alert_type = ").push_bind(alert_type);
        if let Some(branch_id) = branch_id {
            qb.push(" AND branch_id = ").push_bind(branch_id);
        }
        qb.push(" ORDER BY created_at");

        let alerts = qb.build_query_as::<StockAlert>().fetch_all(executor).await?;
        Ok(alerts)
    }

    pub async fn resolve_alert<'e, E>(
        &self,
        executor: E,
        alert_id: Uuid,
        user_id: &str,
        alert_type: AlertType,
        resolved_by: &str,
    ) -> Result<Option<StockAlert>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let alert = sqlx::query_as::<_, StockAlert>(
            r#"
            UPDATE stock_alerts
            SET status = 'resolved', resolved_at = now(), resolved_by = $4
            WHERE id = $1 AND user_id = $2 AND alert_type = $3 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(alert_id)
        .bind(user_id)
        .bind(alert_type)
        .bind(resolved_by)
        .fetch_optional(executor)
        .await?;

        Ok(alert)
    }

    // ---
    // Audits
    // ---

    pub async fn create_audit<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        branch_id: Uuid,
        started_by: &str,
    ) -> Result<StockAudit, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let audit = sqlx::query_as::<_, StockAudit>(
            r#"
            INSERT INTO stock_audits (user_id, branch_id, started_by)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(branch_id)
        .bind(started_by)
        .fetch_one(executor)
        .await?;

        Ok(audit)
    }

    /// Snapshots the system stock an audit line will be counted against.
    pub async fn insert_audit_snapshot<'e, E>(
        &self,
        executor: E,
        audit_id: Uuid,
        product_id: Uuid,
        system_stock: i32,
    ) -> Result<StockAuditItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, StockAuditItem>(
            r#"
            INSERT INTO stock_audit_items (audit_id, product_id, system_stock)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(audit_id)
        .bind(product_id)
        .bind(system_stock)
        .fetch_one(executor)
        .await?;

        Ok(item)
    }

    /// Stores a physical count next to the live stock it was reconciled
    /// against. The opening snapshot is kept; a product counted without one
    /// gets the live stock as its snapshot.
    pub async fn record_audit_count<'e, E>(
        &self,
        executor: E,
        audit_id: Uuid,
        product_id: Uuid,
        live_stock: i32,
        physical_stock: i32,
    ) -> Result<StockAuditItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, StockAuditItem>(
            r#"
            INSERT INTO stock_audit_items (audit_id, product_id, system_stock, physical_stock, reconciled_stock)
            VALUES ($1, $2, $3, $4, $3)
            ON CONFLICT (audit_id, product_id)
            DO UPDATE SET physical_stock = EXCLUDED.physical_stock,
                          reconciled_stock = EXCLUDED.reconciled_stock
            RETURNING *
            "#,
        )
        .bind(audit_id)
        .bind(product_id)
        .bind(live_stock)
        .bind(physical_stock)
        .fetch_one(executor)
        .await?;

        Ok(item)
    }

    pub async fn get_audit_for_update<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        audit_id: Uuid,
    ) -> Result<Option<StockAudit>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let audit = sqlx::query_as::<_, StockAudit>(
            "SELECT * FROM stock_audits WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(audit_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(audit)
    }

    pub async fn list_audit_items<'e, E>(
        &self,
        executor: E,
        audit_id: Uuid,
    ) -> Result<Vec<StockAuditItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, StockAuditItem>(
            "SELECT * FROM stock_audit_items WHERE audit_id = $1 ORDER BY product_id",
        )
        .bind(audit_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    pub async fn close_audit<'e, E>(&self, executor: E, audit_id: Uuid) -> Result<StockAudit, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let audit = sqlx::query_as::<_, StockAudit>(
            r#"
            UPDATE stock_audits
            SET status = 'RECONCILED', reconciled_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(audit_id)
        .fetch_one(executor)
        .await?;

        Ok(audit)
    }
}
