// src/models/purchase_order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "purchase_order_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Sent,
    Received,
}

impl PurchaseOrderStatus {
    pub fn can_transition_to(self, next: PurchaseOrderStatus) -> bool {
        use PurchaseOrderStatus::*;
        matches!(
            (self, next),
            (Draft, Pending)
                | (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Sent)
                | (Sent, Received)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "DRAFT",
            PurchaseOrderStatus::Pending => "PENDING",
            PurchaseOrderStatus::Approved => "APPROVED",
            PurchaseOrderStatus::Rejected => "REJECTED",
            PurchaseOrderStatus::Sent => "SENT",
            PurchaseOrderStatus::Received => "RECEIVED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub id: Uuid,
    #[schema(ignore)]
    pub user_id: String,
    pub supplier_id: Uuid,
    pub branch_id: Uuid,
    pub requested_by: String,
    pub approved_by: Option<String>,
    pub status: PurchaseOrderStatus,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub supplier_notes: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderItem {
    pub purchase_order_id: Uuid,
    pub product_id: Uuid,
    #[schema(example = 100)]
    pub quantity_ordered: i32,
    pub quantity_received: Option<i32>,
    #[schema(example = "250.00")]
    pub unit_cost: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderDetail {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
}

// --- Service inputs ---

#[derive(Debug, Clone)]
pub struct PurchaseOrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_cost: Decimal,
}

#[derive(Debug, Clone)]
pub struct ApprovalDecision {
    pub approved: bool,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
}

/// Per-line reconciliation on receipt.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub product_id: Uuid,
    pub quantity_ordered: i32,
    pub quantity_received: i32,
    pub shortfall: i32,
}
