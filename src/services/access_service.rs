// src/services/access_service.rs

use crate::{
    common::error::AppError,
    db::AccessRepository,
    models::access::{AccessResolution, Role, StaffMember, StaffStatus},
};

// --- Permission slugs ---
pub const INVENTORY_READ: &str = "inventory:read";
pub const INVENTORY_WRITE: &str = "inventory:write";
pub const INVENTORY_AUDIT: &str = "inventory:audit";
pub const TRANSFERS_REQUEST: &str = "transfers:request";
pub const TRANSFERS_APPROVE: &str = "transfers:approve";
pub const TRANSFERS_SHIP: &str = "transfers:ship";
pub const TRANSFERS_RECEIVE: &str = "transfers:receive";
pub const PURCHASE_ORDERS_CREATE: &str = "purchase_orders:create";
pub const PURCHASE_ORDERS_APPROVE: &str = "purchase_orders:approve";
pub const PURCHASE_ORDERS_SEND: &str = "purchase_orders:send";
pub const PURCHASE_ORDERS_RECEIVE: &str = "purchase_orders:receive";
pub const SUBSCRIPTIONS_MANAGE: &str = "subscriptions:manage";
pub const STAFF_MANAGE: &str = "staff:manage";
pub const ADMIN_SUBSCRIPTIONS: &str = "admin:subscriptions";

/// Everything an account owner may do inside their own tenant.
pub const OWNER_PERMISSIONS: &[&str] = &[
    INVENTORY_READ,
    INVENTORY_WRITE,
    INVENTORY_AUDIT,
    TRANSFERS_REQUEST,
    TRANSFERS_APPROVE,
    TRANSFERS_SHIP,
    TRANSFERS_RECEIVE,
    PURCHASE_ORDERS_CREATE,
    PURCHASE_ORDERS_APPROVE,
    PURCHASE_ORDERS_SEND,
    PURCHASE_ORDERS_RECEIVE,
    SUBSCRIPTIONS_MANAGE,
    STAFF_MANAGE,
];

/// Platform-wide actions, only granted to the super-admin.
pub const ADMIN_PERMISSIONS: &[&str] = &[ADMIN_SUBSCRIPTIONS];

#[derive(Clone)]
pub struct AccessService {
    repo: AccessRepository,
    super_admin_id: String,
}

impl AccessService {
    pub fn new(repo: AccessRepository, super_admin_id: String) -> Self {
        Self { repo, super_admin_id }
    }

    /// Resolves role and permissions for `user_id`. A missing staff record
    /// is not an error: the caller is then the owner of their own tenant.
    /// Store failures propagate, callers must deny on `Err`.
    pub async fn resolve_access(&self, user_id: &str) -> Result<AccessResolution, AppError> {
        if user_id == self.super_admin_id {
            return Ok(resolve(user_id, &self.super_admin_id, None));
        }

        let staff = self.repo.find_staff_by_auth_id(user_id).await?;
        Ok(resolve(user_id, &self.super_admin_id, staff))
    }
}

pub fn resolve(user_id: &str, super_admin_id: &str, staff: Option<StaffMember>) -> AccessResolution {
    if user_id == super_admin_id {
        let permissions = OWNER_PERMISSIONS
            .iter()
            .chain(ADMIN_PERMISSIONS)
            .map(|p| p.to_string())
            .collect();
        return AccessResolution {
            user_id: user_id.to_string(),
            tenant_id: user_id.to_string(),
            role: Role::SuperAdmin,
            permissions,
            authorized: true,
        };
    }

    match staff {
        Some(member) => {
            let authorized = member.status == StaffStatus::Active;
            AccessResolution {
                user_id: user_id.to_string(),
                tenant_id: member.user_id,
                role: Role::Staff,
                // A disabled member keeps nothing, whatever the stored role says
                permissions: if authorized { member.permissions } else { Vec::new() },
                authorized,
            }
        }
        None => AccessResolution {
            user_id: user_id.to_string(),
            tenant_id: user_id.to_string(),
            role: Role::Owner,
            permissions: OWNER_PERMISSIONS.iter().map(|p| p.to_string()).collect(),
            authorized: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn staff(status: StaffStatus, permissions: &[&str]) -> StaffMember {
        StaffMember {
            id: Uuid::new_v4(),
            user_id: "owner-1".into(),
            auth_id: "staff-auth-1".into(),
            full_name: "Achieng Otieno".into(),
            role: "cashier".into(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            status,
            two_factor_enabled: false,
            accepted_at: Some(Utc::now()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn super_admin_gets_everything_without_lookup() {
        let access = resolve("root", "root", None);
        assert_eq!(access.role, Role::SuperAdmin);
        assert!(access.authorized);
        assert!(access.has_permission(ADMIN_SUBSCRIPTIONS));
        assert!(access.has_permission(TRANSFERS_APPROVE));
    }

    #[test]
    fn super_admin_wins_even_with_a_staff_record() {
        let access = resolve("root", "root", Some(staff(StaffStatus::Inactive, &[])));
        assert_eq!(access.role, Role::SuperAdmin);
        assert!(access.authorized);
    }

    #[test]
    fn missing_staff_record_falls_back_to_owner() {
        let access = resolve("owner-9", "root", None);
        assert_eq!(access.role, Role::Owner);
        assert_eq!(access.tenant_id, "owner-9");
        assert!(access.has_permission(INVENTORY_WRITE));
        assert!(!access.has_permission(ADMIN_SUBSCRIPTIONS));
    }

    #[test]
    fn active_staff_acts_on_owner_tenant_with_own_permissions() {
        let access = resolve("staff-auth-1", "root", Some(staff(StaffStatus::Active, &[INVENTORY_READ])));
        assert_eq!(access.role, Role::Staff);
        assert_eq!(access.tenant_id, "owner-1");
        assert!(access.has_permission(INVENTORY_READ));
        assert!(!access.has_permission(INVENTORY_WRITE));
    }

    #[test]
    fn inactive_staff_is_denied_regardless_of_permissions() {
        let access = resolve(
            "staff-auth-1",
            "root",
            Some(staff(StaffStatus::Inactive, &[INVENTORY_READ, STAFF_MANAGE])),
        );
        assert!(!access.authorized);
        assert!(!access.has_permission(INVENTORY_READ));
    }

    #[test]
    fn permission_check_is_exact_membership() {
        let access = resolve("staff-auth-1", "root", Some(staff(StaffStatus::Active, &["inventory:*"])));
        assert!(!access.has_permission(INVENTORY_READ));
        assert!(access.has_permission("inventory:*"));
    }
}
