// src/db/transfer_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::transfer::{BranchTransfer, TransferItem, TransferStatus},
};

#[derive(Clone)]
pub struct TransferRepository {
    pool: PgPool,
}

impl TransferRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  READS
    // =========================================================================

    pub async fn find<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        transfer_id: Uuid,
    ) -> Result<Option<BranchTransfer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let transfer = sqlx::query_as::<_, BranchTransfer>(
            "SELECT * FROM branch_transfers WHERE id = $1 AND user_id = $2",
        )
        .bind(transfer_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(transfer)
    }

    /// Locks the transfer row for the rest of the transaction so two
    /// workflow steps on the same transfer cannot interleave.
    pub async fn find_for_update<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        transfer_id: Uuid,
    ) -> Result<Option<BranchTransfer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let transfer = sqlx::query_as::<_, BranchTransfer>(
            "SELECT * FROM branch_transfers WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(transfer_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(transfer)
    }

    pub async fn list(
        &self,
        user_id: &str,
        status: Option<TransferStatus>,
    ) -> Result<Vec<BranchTransfer>, AppError> {
        let transfers = sqlx::query_as::<_, BranchTransfer>(
            r#"
            SELECT * FROM branch_transfers
            WHERE user_id = $1 AND ($2::transfer_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(transfers)
    }

    pub async fn list_items<'e, E>(
        &self,
        executor: E,
        transfer_id: Uuid,
    ) -> Result<Vec<TransferItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Ordered by product so stock rows are always locked in the same order
        let items = sqlx::query_as::<_, TransferItem>(
            "SELECT * FROM branch_transfer_items WHERE transfer_id = $1 ORDER BY product_id",
        )
        .bind(transfer_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    // =========================================================================
    //  WRITES
    // =========================================================================

    pub async fn create<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        source_branch_id: Uuid,
        dest_branch_id: Uuid,
        requested_by: &str,
    ) -> Result<BranchTransfer, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let transfer = sqlx::query_as::<_, BranchTransfer>(
            r#"
            INSERT INTO branch_transfers (user_id, source_branch_id, dest_branch_id, requested_by)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(source_branch_id)
        .bind(dest_branch_id)
        .bind(requested_by)
        .fetch_one(executor)
        .await?;

        Ok(transfer)
    }

    pub async fn add_item<'e, E>(
        &self,
        executor: E,
        transfer_id: Uuid,
        product_id: Uuid,
        requested_qty: i32,
    ) -> Result<TransferItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, TransferItem>(
            r#"
            INSERT INTO branch_transfer_items (transfer_id, product_id, requested_qty)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(transfer_id)
        .bind(product_id)
        .bind(requested_qty)
        .fetch_one(executor)
        .await?;

        Ok(item)
    }

    pub async fn set_approved_qty<'e, E>(
        &self,
        executor: E,
        transfer_id: Uuid,
        product_id: Uuid,
        qty: i32,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE branch_transfer_items SET approved_qty = $3 WHERE transfer_id = $1 AND product_id = $2",
        )
        .bind(transfer_id)
        .bind(product_id)
        .bind(qty)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn set_shipped_qty<'e, E>(
        &self,
        executor: E,
        transfer_id: Uuid,
        product_id: Uuid,
        qty: i32,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE branch_transfer_items SET shipped_qty = $3 WHERE transfer_id = $1 AND product_id = $2",
        )
        .bind(transfer_id)
        .bind(product_id)
        .bind(qty)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn set_received_qty<'e, E>(
        &self,
        executor: E,
        transfer_id: Uuid,
        product_id: Uuid,
        qty: i32,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE branch_transfer_items SET received_qty = $3 WHERE transfer_id = $1 AND product_id = $2",
        )
        .bind(transfer_id)
        .bind(product_id)
        .bind(qty)
        .execute(executor)
        .await?;

        Ok(())
    }

    // --- Status changes ---
    // Each one is a compare-and-swap on the expected status. `None` means
    // the row moved on (or never existed) between the read and the write.

    pub async fn mark_approved<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        transfer_id: Uuid,
        approved_by: &str,
    ) -> Result<Option<BranchTransfer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let transfer = sqlx::query_as::<_, BranchTransfer>(
            r#"
            UPDATE branch_transfers
            SET status = 'APPROVED', approved_by = $3, updated_at = now()
            WHERE id = $1 AND user_id = $2 AND status = 'REQUESTED'
            RETURNING *
            "#,
        )
        .bind(transfer_id)
        .bind(user_id)
        .bind(approved_by)
        .fetch_optional(executor)
        .await?;

        Ok(transfer)
    }

    pub async fn mark_rejected<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        transfer_id: Uuid,
        reason: &str,
    ) -> Result<Option<BranchTransfer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let transfer = sqlx::query_as::<_, BranchTransfer>(
            r#"
            UPDATE branch_transfers
            SET status = 'REJECTED', rejection_reason = $3, updated_at = now()
            WHERE id = $1 AND user_id = $2 AND status IN ('REQUESTED', 'APPROVED')
            RETURNING *
            "#,
        )
        .bind(transfer_id)
        .bind(user_id)
        .bind(reason)
        .fetch_optional(executor)
        .await?;

        Ok(transfer)
    }

    pub async fn mark_shipped<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        transfer_id: Uuid,
        shipped_by: &str,
        tracking_number: Option<&str>,
        estimated_arrival: Option<DateTime<Utc>>,
    ) -> Result<Option<BranchTransfer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let transfer = sqlx::query_as::<_, BranchTransfer>(
            r#"
            UPDATE branch_transfers
            SET status = 'SHIPPED', shipped_by = $3, tracking_number = $4,
                estimated_arrival = $5, updated_at = now()
            WHERE id = $1 AND user_id = $2 AND status = 'APPROVED'
            RETURNING *
            "#,
        )
        .bind(transfer_id)
        .bind(user_id)
        .bind(shipped_by)
        .bind(tracking_number)
        .bind(estimated_arrival)
        .fetch_optional(executor)
        .await?;

        Ok(transfer)
    }

    pub async fn mark_received<'e, E>(
        &self,
        executor: E,
        user_id: &str,
        transfer_id: Uuid,
        received_by: &str,
    ) -> Result<Option<BranchTransfer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let transfer = sqlx::query_as::<_, BranchTransfer>(
            r#"
            UPDATE branch_transfers
            SET status = 'RECEIVED', received_by = $3, updated_at = now()
            WHERE id = $1 AND user_id = $2 AND status = 'SHIPPED'
            RETURNING *
            "#,
        )
        .bind(transfer_id)
        .bind(user_id)
        .bind(received_by)
        .fetch_optional(executor)
        .await?;

        Ok(transfer)
    }
}
