// src/services/staff_service.rs

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::AccessRepository,
    models::{
        access::{StaffMember, StaffStatus},
        plan::Feature,
    },
    services::{access_service::OWNER_PERMISSIONS, plan_service::PlanService},
};

#[derive(Debug, Clone)]
pub struct NewStaffMember {
    pub auth_id: String,
    pub full_name: String,
    pub role: String,
    pub permissions: Vec<String>,
}

/// Staff can be granted any owner-level permission, never a platform one.
pub fn validate_permissions(permissions: &[String]) -> Result<(), AppError> {
    match permissions.iter().find(|p| !OWNER_PERMISSIONS.contains(&p.as_str())) {
        Some(unknown) => Err(AppError::invalid(format!("Unknown permission '{}'", unknown))),
        None => Ok(()),
    }
}

/// Identities that can never be linked to a tenant as staff: the
/// platform admin and the owner creating the record.
pub fn check_staff_identity(auth_id: &str, owner_id: &str, super_admin_id: &str) -> Result<(), AppError> {
    if auth_id == super_admin_id {
        return Err(AppError::invalid(format!("authId '{}' cannot be added as staff", auth_id)));
    }
    if auth_id == owner_id {
        return Err(AppError::invalid("An owner cannot be their own staff member"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct StaffService {
    repo: AccessRepository,
    plan_service: PlanService,
    super_admin_id: String,
}

impl StaffService {
    pub fn new(repo: AccessRepository, plan_service: PlanService, super_admin_id: String) -> Self {
        Self {
            repo,
            plan_service,
            super_admin_id,
        }
    }

    pub async fn create_staff_member(
        &self,
        owner_id: &str,
        input: &NewStaffMember,
    ) -> Result<StaffMember, AppError> {
        validate_permissions(&input.permissions)?;

        let auth_id = input.auth_id.trim();
        check_staff_identity(auth_id, owner_id, &self.super_admin_id)?;

        // A staff record overrides owner resolution, so another tenant's
        // owner would lose their own business
        if self.repo.owns_tenant_data(auth_id).await? {
            tracing::warn!(owner_id, auth_id, "refused staff link to an existing account owner");
            return Err(AppError::invalid(format!(
                "authId '{}' already owns a business account",
                auth_id
            )));
        }

        self.plan_service.ensure_allowed(owner_id, Feature::Staff).await?;

        let mut permissions = input.permissions.clone();
        permissions.sort();
        permissions.dedup();

        let member = self
            .repo
            .create_staff(
                owner_id,
                auth_id,
                input.full_name.trim(),
                input.role.trim(),
                &permissions,
            )
            .await?;

        tracing::info!(owner_id, staff_id = %member.id, "staff member invited");
        Ok(member)
    }

    /// Called by the invited identity itself. An account that already runs
    /// a business cannot join another one.
    pub async fn accept_invitation(&self, auth_id: &str, staff_id: Uuid) -> Result<StaffMember, AppError> {
        if auth_id == self.super_admin_id {
            return Err(AppError::invalid("The platform admin cannot join a business as staff"));
        }
        if self.repo.owns_tenant_data(auth_id).await? {
            return Err(AppError::invalid(
                "Accounts that own a business cannot join another one as staff",
            ));
        }

        let member = self
            .repo
            .accept_invitation(staff_id, auth_id)
            .await?
            .ok_or_else(|| AppError::not_found("Staff invitation"))?;

        tracing::info!(owner_id = %member.user_id, %staff_id, "staff invitation accepted");
        Ok(member)
    }

    pub async fn set_staff_status(
        &self,
        owner_id: &str,
        staff_id: Uuid,
        status: StaffStatus,
    ) -> Result<StaffMember, AppError> {
        let member = self
            .repo
            .set_staff_status(owner_id, staff_id, status)
            .await?
            .ok_or_else(|| AppError::not_found("Staff member"))?;

        tracing::info!(owner_id, %staff_id, ?status, "staff status changed");
        Ok(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_level_permissions_are_grantable() {
        let perms = vec!["inventory:read".to_string(), "transfers:ship".to_string()];
        assert!(validate_permissions(&perms).is_ok());
        assert!(validate_permissions(&[]).is_ok());
    }

    #[test]
    fn admin_and_self_cannot_become_staff() {
        let err = check_staff_identity("root", "owner-1", "root").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(check_staff_identity("owner-1", "owner-1", "root").is_err());
        assert!(check_staff_identity("clerk-9", "owner-1", "root").is_ok());
    }

    #[test]
    fn platform_or_unknown_permissions_are_refused() {
        let err = validate_permissions(&["admin:subscriptions".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "Unknown permission 'admin:subscriptions'");
        assert!(validate_permissions(&["inventory:*".to_string()]).is_err());
    }

    // --- Against a real database (fresh schema per test) ---

    use crate::{
        db::{SubscriptionRepository, UsageRepository},
        models::{access::Role, subscription::PlanType},
        services::{access_service::AccessService, subscription_service::SubscriptionService},
    };
    use chrono::FixedOffset;
    use sqlx::PgPool;

    const ROOT: &str = "platform-admin";

    async fn staff_admin(pool: &PgPool, pro_owner: &str) -> (StaffService, AccessService) {
        let subscriptions = SubscriptionService::new(SubscriptionRepository::new(pool.clone()), pool.clone());
        let pro = subscriptions.create_subscription(pro_owner, PlanType::Monthly).await.unwrap();
        subscriptions.activate_subscription(pro.id, "MPESA-PRO").await.unwrap();

        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        let plans = PlanService::new(UsageRepository::new(pool.clone()), subscriptions, offset);
        let access_repo = AccessRepository::new(pool.clone());
        (
            StaffService::new(access_repo.clone(), plans, ROOT.into()),
            AccessService::new(access_repo, ROOT.into()),
        )
    }

    fn invite(auth_id: &str) -> NewStaffMember {
        NewStaffMember {
            auth_id: auth_id.into(),
            full_name: "Baraka Mwangi".into(),
            role: "cashier".into(),
            permissions: vec!["inventory:read".into()],
        }
    }

    #[sqlx::test]
    async fn another_owner_cannot_be_taken_over(pool: PgPool) {
        let (staff, access) = staff_admin(&pool, "owner-a").await;
        sqlx::query("INSERT INTO branches (user_id, name) VALUES ($1, $2)")
            .bind("owner-b")
            .bind("Kisumu")
            .execute(&pool)
            .await
            .unwrap();

        let err = staff.create_staff_member("owner-a", &invite("owner-b")).await.unwrap_err();
        assert!(err.to_string().contains("already owns a business"));
        assert!(staff.create_staff_member("owner-a", &invite(ROOT)).await.is_err());

        let victim = access.resolve_access("owner-b").await.unwrap();
        assert_eq!(victim.role, Role::Owner);
        assert_eq!(victim.tenant_id, "owner-b");
    }

    #[sqlx::test]
    async fn invitation_takes_effect_only_once_accepted(pool: PgPool) {
        let (staff, access) = staff_admin(&pool, "owner-a").await;

        let member = staff.create_staff_member("owner-a", &invite("clerk-1")).await.unwrap();
        assert!(member.accepted_at.is_none());

        let before = access.resolve_access("clerk-1").await.unwrap();
        assert_eq!(before.role, Role::Owner);
        assert_eq!(before.tenant_id, "clerk-1");

        assert!(matches!(
            staff.accept_invitation("someone-else", member.id).await,
            Err(AppError::NotFound(_))
        ));

        staff.accept_invitation("clerk-1", member.id).await.unwrap();
        let after = access.resolve_access("clerk-1").await.unwrap();
        assert_eq!(after.role, Role::Staff);
        assert_eq!(after.tenant_id, "owner-a");
        assert_eq!(after.permissions, vec!["inventory:read".to_string()]);
    }

    #[sqlx::test]
    async fn owner_with_data_cannot_accept_an_invitation(pool: PgPool) {
        let (staff, access) = staff_admin(&pool, "owner-a").await;
        let member = staff.create_staff_member("owner-a", &invite("owner-c")).await.unwrap();

        // owner-c started their own business after being invited
        sqlx::query("INSERT INTO products (user_id, name) VALUES ($1, $2)")
            .bind("owner-c")
            .bind("Unga 2kg")
            .execute(&pool)
            .await
            .unwrap();

        assert!(staff.accept_invitation("owner-c", member.id).await.is_err());
        assert_eq!(access.resolve_access("owner-c").await.unwrap().role, Role::Owner);
    }
}
