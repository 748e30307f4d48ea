// src/models/inventory.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- 1. Stock level (one product at one branch) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockLevel {
    pub id: Uuid,
    #[schema(ignore)]
    pub user_id: String,
    pub product_id: Uuid,
    pub branch_id: Uuid,
    #[schema(example = 40)]
    pub current_stock: i32,
    #[schema(example = 5)]
    pub reserved_stock: i32,
    #[schema(example = 10)]
    pub reorder_point: i32,
    #[schema(example = 50)]
    pub reorder_quantity: i32,
    pub updated_at: DateTime<Utc>,
}

impl StockLevel {
    /// Units that can still leave the branch.
    pub fn available(&self) -> i32 {
        self.current_stock - self.reserved_stock
    }

    pub fn is_low(&self) -> bool {
        self.current_stock <= self.reorder_point
    }
}

// --- 2. Movements (append-only ledger) ---
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "movement_type", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum MovementType {
    Initial,
    Adjustment,
    Sale,
    TransferIn,
    TransferOut,
    AuditAdjustment,
    PurchaseReceipt,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: Uuid,
    #[schema(ignore)]
    pub user_id: String,
    pub product_id: Uuid,
    pub branch_id: Uuid,
    #[schema(example = -5)]
    pub quantity: i32,
    pub movement_type: MovementType,
    #[schema(example = "sale")]
    pub reason: Option<String>,
    /// Transfer, audit or purchase order that produced the movement.
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Movement about to be written. The ledger never updates rows after insert.
#[derive(Debug, Clone)]
pub struct NewMovement<'a> {
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub quantity: i32,
    pub movement_type: MovementType,
    pub reason: Option<&'a str>,
    pub reference_id: Option<Uuid>,
}

// --- 3. Alerts ---
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "alert_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    Expiry,
}

impl std::str::FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low_stock" => Ok(AlertType::LowStock),
            "expiry" => Ok(AlertType::Expiry),
            other => Err(format!("alertType must be one of low_stock, expiry (got '{}')", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "alert_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockAlert {
    pub id: Uuid,
    #[schema(ignore)]
    pub user_id: String,
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub alert_type: AlertType,
    pub status: AlertStatus,
    pub current_stock: i32,
    pub reorder_point: i32,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

// --- 4. Audits ---
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "audit_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Open,
    Reconciled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockAudit {
    pub id: Uuid,
    #[schema(ignore)]
    pub user_id: String,
    pub branch_id: Uuid,
    pub status: AuditStatus,
    pub started_by: String,
    pub created_at: DateTime<Utc>,
    pub reconciled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockAuditItem {
    pub audit_id: Uuid,
    pub product_id: Uuid,
    /// Snapshot taken when the audit was opened.
    pub system_stock: i32,
    pub physical_stock: Option<i32>,
    /// Live stock the count was reconciled against. Differs from the
    /// snapshot when stock moved while the audit was open.
    pub reconciled_stock: Option<i32>,
}

impl StockAuditItem {
    /// Movement on the level between opening and reconciling the audit.
    pub fn drift(&self) -> Option<i32> {
        self.reconciled_stock.map(|live| live - self.system_stock)
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockAuditDetail {
    #[serde(flatten)]
    pub audit: StockAudit,
    pub items: Vec<StockAuditItem>,
}

// --- 5. Query filters ---

/// Filter for stock level listings. Always scoped to one tenant.
#[derive(Debug, Clone, Default)]
pub struct StockLevelFilter {
    pub branch_id: Option<Uuid>,
    pub product_ids: Option<Vec<Uuid>>,
    pub low_stock_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub branch_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub limit: i64,
}

// --- 6. Bulk initialization report ---
#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitializationReport {
    pub initialized: usize,
    pub skipped: usize,
    pub failed: Vec<InitializationFailure>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitializationFailure {
    pub product_id: Uuid,
    pub error: String,
}
