// src/handlers/staff.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, extract::Json, response::success},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{PermStaffManage, RequirePermission},
    },
    models::access::{StaffMember, StaffStatus},
    services::staff_service::NewStaffMember,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaffPayload {
    #[validate(length(min = 1, message = "authId is required"))]
    pub auth_id: String,
    #[validate(length(min = 1, max = 120, message = "fullName must be 1 to 120 characters"))]
    pub full_name: String,
    #[validate(length(min = 1, message = "role is required"))]
    #[schema(example = "storekeeper")]
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

// POST /api/staff
#[utoipa::path(
    post,
    path = "/api/staff",
    tag = "Staff",
    request_body = CreateStaffPayload,
    responses(
        (status = 201, description = "Invitation created, effective once accepted", body = StaffMember),
        (status = 400, description = "Invalid field, unknown permission or authId owning a business"),
        (status = 403, description = "Staff limit of the plan reached")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_staff_member(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermStaffManage>,
    Json(payload): Json<CreateStaffPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let input = NewStaffMember {
        auth_id: payload.auth_id,
        full_name: payload.full_name,
        role: payload.role,
        permissions: payload.permissions,
    };

    let member = app_state
        .staff_service
        .create_staff_member(&access.tenant_id, &input)
        .await?;

    Ok((StatusCode::CREATED, success(member)))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetStaffStatusPayload {
    pub status: StaffStatus,
}

// POST /api/staff/{staff_id}/status
#[utoipa::path(
    post,
    path = "/api/staff/{staff_id}/status",
    tag = "Staff",
    request_body = SetStaffStatusPayload,
    params(("staff_id" = Uuid, Path, description = "Staff member")),
    responses(
        (status = 200, description = "Status changed", body = StaffMember),
        (status = 404, description = "Not found in the caller's tenant")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_staff_status(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermStaffManage>,
    Path(staff_id): Path<Uuid>,
    Json(payload): Json<SetStaffStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    let member = app_state
        .staff_service
        .set_staff_status(&access.tenant_id, staff_id, payload.status)
        .await?;

    Ok(success(member))
}

// POST /api/staff/{staff_id}/accept
#[utoipa::path(
    post,
    path = "/api/staff/{staff_id}/accept",
    tag = "Staff",
    params(("staff_id" = Uuid, Path, description = "Staff invitation")),
    responses(
        (status = 200, description = "Caller now works for the inviting business", body = StaffMember),
        (status = 400, description = "Caller owns a business or already works for one"),
        (status = 404, description = "No pending invitation for the caller")
    ),
    security(("api_jwt" = []))
)]
pub async fn accept_invitation(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(staff_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let member = app_state
        .staff_service
        .accept_invitation(&user.id, staff_id)
        .await?;

    Ok(success(member))
}
