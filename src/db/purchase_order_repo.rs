// src/db/purchase_order_repo.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::purchase_order::{PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus},
};

#[derive(Clone)]
pub struct PurchaseOrderRepository {
    pool: PgPool,
}

impl PurchaseOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        user_id: &str,
        status: Option<PurchaseOrderStatus>,
    ) -> Result<Vec<PurchaseOrder>, AppError> {
        let orders = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            SELECT * FROM purchase_orders
            WHERE user_id = $1 AND ($2::purchase_order_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        supplier_id: Uuid,
        branch_id: Uuid,
        requested_by: &str,
        notes: Option<&str>,
    ) -> Result<PurchaseOrder, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            INSERT INTO purchase_orders (user_id, supplier_id, branch_id, requested_by, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(supplier_id)
        .bind(branch_id)
        .bind(requested_by)
        .bind(notes)
        .fetch_one(executor)
        .await?;

        Ok(order)
    }

    pub async fn add_item<'e, E>(
        &self,
        executor: E,
        purchase_order_id: Uuid,
        product_id: Uuid,
        quantity_ordered: i32,
        unit_cost: Decimal,
    ) -> Result<PurchaseOrderItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, PurchaseOrderItem>(
            r#"
            INSERT INTO purchase_order_items (purchase_order_id, product_id, quantity_ordered, unit_cost)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(purchase_order_id)
        .bind(product_id)
        .bind(quantity_ordered)
        .bind(unit_cost)
        .fetch_one(executor)
        .await?;

        Ok(item)
    }

    pub async fn find<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        purchase_order_id: Uuid,
    ) -> Result<Option<PurchaseOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, PurchaseOrder>(
            "SELECT * FROM purchase_orders WHERE id = $1 AND user_id = $2",
        )
        .bind(purchase_order_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(order)
    }

    pub async fn find_for_update<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        purchase_order_id: Uuid,
    ) -> Result<Option<PurchaseOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, PurchaseOrder>(
            "SELECT * FROM purchase_orders WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(purchase_order_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(order)
    }

    pub async fn list_items<'e, E>(
        &self,
        executor: E,
        purchase_order_id: Uuid,
    ) -> Result<Vec<PurchaseOrderItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, PurchaseOrderItem>(
            "SELECT * FROM purchase_order_items WHERE purchase_order_id = $1 ORDER BY product_id",
        )
        .bind(purchase_order_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    pub async fn set_received_qty<'e, E>(
        &self,
        executor: E,
        purchase_order_id: Uuid,
        product_id: Uuid,
        quantity_received: i32,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE purchase_order_items SET quantity_received = $3
            WHERE purchase_order_id = $1 AND product_id = $2
            "#,
        )
        .bind(purchase_order_id)
        .bind(product_id)
        .bind(quantity_received)
        .execute(executor)
        .await?;

        Ok(())
    }

    // --- Status changes (compare-and-swap on the expected status) ---

    pub async fn mark_pending<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        purchase_order_id: Uuid,
    ) -> Result<Option<PurchaseOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            UPDATE purchase_orders SET status = 'PENDING', updated_at = now()
            WHERE id = $1 AND user_id = $2 AND status = 'DRAFT'
            RETURNING *
            "#,
        )
        .bind(purchase_order_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(order)
    }

    pub async fn record_decision<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        purchase_order_id: Uuid,
        approved: bool,
        decided_by: &str,
        rejection_reason: Option<&str>,
        notes: Option<&str>,
    ) -> Result<Option<PurchaseOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            UPDATE purchase_orders
            SET status = CASE WHEN $3 THEN 'APPROVED'::purchase_order_status
                              ELSE 'REJECTED'::purchase_order_status END,
                approved_by = $4,
                rejection_reason = $5,
                notes = COALESCE($6, notes),
                updated_at = now()
            WHERE id = $1 AND user_id = $2 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(purchase_order_id)
        .bind(user_id)
        .bind(approved)
        .bind(decided_by)
        .bind(rejection_reason)
        .bind(notes)
        .fetch_optional(executor)
        .await?;

        Ok(order)
    }

    pub async fn mark_sent<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        purchase_order_id: Uuid,
        sent_at: DateTime<Utc>,
        supplier_notes: Option<&str>,
    ) -> Result<Option<PurchaseOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            UPDATE purchase_orders
            SET status = 'SENT', sent_at = $3, supplier_notes = $4, updated_at = now()
            WHERE id = $1 AND user_id = $2 AND status = 'APPROVED'
            RETURNING *
            "#,
        )
        .bind(purchase_order_id)
        .bind(user_id)
        .bind(sent_at)
        .bind(supplier_notes)
        .fetch_optional(executor)
        .await?;

        Ok(order)
    }

    pub async fn mark_received<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        purchase_order_id: Uuid,
    ) -> Result<Option<PurchaseOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            UPDATE purchase_orders
            SET status = 'RECEIVED', received_at = now(), updated_at = now()
            WHERE id = $1 AND user_id = $2 AND status = 'SENT'
            RETURNING *
            "#,
        )
        .bind(purchase_order_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(order)
    }
}
