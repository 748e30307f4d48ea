// src/models/transfer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "transfer_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Requested,
    Approved,
    Shipped,
    Received,
    Rejected,
}

impl TransferStatus {
    /// Forward-only workflow. REJECTED is reachable before anything ships.
    pub fn can_transition_to(self, next: TransferStatus) -> bool {
        use TransferStatus::*;
        matches!(
            (self, next),
            (Requested, Approved)
                | (Approved, Shipped)
                | (Shipped, Received)
                | (Requested, Rejected)
                | (Approved, Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TransferStatus::Received | TransferStatus::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Requested => "REQUESTED",
            TransferStatus::Approved => "APPROVED",
            TransferStatus::Shipped => "SHIPPED",
            TransferStatus::Received => "RECEIVED",
            TransferStatus::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BranchTransfer {
    pub id: Uuid,
    #[schema(ignore)]
    pub user_id: String,
    pub source_branch_id: Uuid,
    pub dest_branch_id: Uuid,
    pub status: TransferStatus,
    pub requested_by: String,
    pub approved_by: Option<String>,
    pub shipped_by: Option<String>,
    pub received_by: Option<String>,
    #[schema(example = "KE-TRK-00921")]
    pub tracking_number: Option<String>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferItem {
    pub transfer_id: Uuid,
    pub product_id: Uuid,
    #[schema(example = 20)]
    pub requested_qty: i32,
    #[schema(example = 15)]
    pub approved_qty: Option<i32>,
    pub shipped_qty: Option<i32>,
    pub received_qty: Option<i32>,
}

impl TransferItem {
    /// Units shipped but not (yet) received. Never negative.
    pub fn in_transit(&self) -> i32 {
        (self.shipped_qty.unwrap_or(0) - self.received_qty.unwrap_or(0)).max(0)
    }

    /// Shortfall recorded on receipt, zero when the line arrived complete.
    pub fn discrepancy(&self) -> i32 {
        match self.received_qty {
            Some(received) => self.shipped_qty.unwrap_or(0) - received,
            None => 0,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferDetail {
    #[serde(flatten)]
    pub transfer: BranchTransfer,
    pub items: Vec<TransferItem>,
}

// --- Service inputs ---

#[derive(Debug, Clone, Copy)]
pub struct TransferLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct ShipmentDetails {
    pub shipped_by: String,
    pub tracking_number: Option<String>,
    pub estimated_arrival: Option<String>,
}
