// src/middleware/rbac.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::marker::PhantomData;

use crate::{
    common::error::AppError,
    middleware::auth::AuthenticatedUser,
    models::access::AccessResolution,
    services::access_service::{self, AccessService},
};

pub trait PermissionDef: Send + Sync + 'static {
    fn slug() -> &'static str;
}

/// Resolved caller who holds permission `T`. Handlers read the tenant and
/// acting user from the carried resolution.
pub struct RequirePermission<T>(pub AccessResolution, pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionDef,
    S: Send + Sync,
    AccessService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;
        let access = resolve_caller(&AccessService::from_ref(state), &user.id).await?;

        let required = T::slug();
        if !access.has_permission(required) {
            tracing::info!(user_id = %user.id, permission = required, "permission denied");
            return Err(AppError::Forbidden(format!(
                "You need the '{}' permission to perform this action",
                required
            )));
        }

        Ok(RequirePermission(access, PhantomData))
    }
}

/// Any authorized caller, whatever their permissions.
pub struct Caller(pub AccessResolution);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    AccessService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;
        resolve_caller(&AccessService::from_ref(state), &user.id)
            .await
            .map(Caller)
    }
}

// Fails closed: a resolution error denies the request.
async fn resolve_caller(service: &AccessService, user_id: &str) -> Result<AccessResolution, AppError> {
    let access = service.resolve_access(user_id).await.map_err(|e| {
        tracing::error!(user_id, error = %e, "access resolution failed");
        AppError::Forbidden("Unable to verify access".into())
    })?;

    if !access.authorized {
        return Err(AppError::Forbidden("Your account has been disabled".into()));
    }
    Ok(access)
}

macro_rules! permissions {
    ($($name:ident => $slug:expr),* $(,)?) => {
        $(
            pub struct $name;
            impl PermissionDef for $name {
                fn slug() -> &'static str { $slug }
            }
        )*
    };
}

permissions! {
    PermInventoryRead => access_service::INVENTORY_READ,
    PermInventoryWrite => access_service::INVENTORY_WRITE,
    PermInventoryAudit => access_service::INVENTORY_AUDIT,
    PermTransfersRequest => access_service::TRANSFERS_REQUEST,
    PermTransfersApprove => access_service::TRANSFERS_APPROVE,
    PermTransfersShip => access_service::TRANSFERS_SHIP,
    PermTransfersReceive => access_service::TRANSFERS_RECEIVE,
    PermPurchaseOrdersCreate => access_service::PURCHASE_ORDERS_CREATE,
    PermPurchaseOrdersApprove => access_service::PURCHASE_ORDERS_APPROVE,
    PermPurchaseOrdersSend => access_service::PURCHASE_ORDERS_SEND,
    PermPurchaseOrdersReceive => access_service::PURCHASE_ORDERS_RECEIVE,
    PermSubscriptionsManage => access_service::SUBSCRIPTIONS_MANAGE,
    PermStaffManage => access_service::STAFF_MANAGE,
    PermAdminSubscriptions => access_service::ADMIN_SUBSCRIPTIONS,
}
