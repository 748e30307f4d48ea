// src/models/access.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "staff_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StaffStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    pub id: Uuid,
    /// Owner (tenant) the staff member works for.
    #[schema(ignore)]
    pub user_id: String,
    pub auth_id: String,
    #[schema(example = "Wanjiru Kamau")]
    pub full_name: String,
    #[schema(example = "storekeeper")]
    pub role: String,
    #[schema(example = json!(["inventory:read", "inventory:write"]))]
    pub permissions: Vec<String>,
    pub status: StaffStatus,
    pub two_factor_enabled: bool,
    /// Unset while the invitation is pending; the record is ignored until then.
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    SuperAdmin,
    Owner,
    Staff,
}

/// Outcome of resolving a caller. `tenant_id` is the owner whose data the
/// caller acts on.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessResolution {
    pub user_id: String,
    pub tenant_id: String,
    pub role: Role,
    pub permissions: Vec<String>,
    pub authorized: bool,
}

impl AccessResolution {
    /// Exact membership, no wildcards or hierarchy.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.authorized && has_permission(&self.permissions, permission)
    }
}

pub fn has_permission(set: &[String], permission: &str) -> bool {
    set.iter().any(|p| p == permission)
}
