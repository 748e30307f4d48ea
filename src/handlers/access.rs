// src/handlers/access.rs

use axum::{extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::{
    common::{
        error::AppError,
        extract::{Json, Query},
        response::success,
    },
    config::AppState,
    middleware::{auth::AuthenticatedUser, rbac::Caller},
    models::{
        access::AccessResolution,
        plan::{AccessCheck, Feature},
    },
};

// GET /api/health
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health() -> impl IntoResponse {
    Json(json!({ "success": true, "status": "ok" }))
}

// GET /api/access/me
#[utoipa::path(
    get,
    path = "/api/access/me",
    tag = "Access",
    responses(
        (status = 200, description = "Role and permissions of the caller", body = AccessResolution),
        (status = 403, description = "Access could not be resolved")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_my_access(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    // Disabled staff still get their (empty) resolution back, but a lookup
    // failure is a denial.
    let access = app_state
        .access_service
        .resolve_access(&user.id)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user.id, error = %e, "access resolution failed");
            AppError::Forbidden("Unable to verify access".into())
        })?;

    Ok(success(access))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PlanCheckQuery {
    /// One of branches, staff, products, suppliers, debtors, dailySales, reports.
    pub feature: Feature,
}

// GET /api/plan/check
#[utoipa::path(
    get,
    path = "/api/plan/check",
    tag = "Access",
    params(PlanCheckQuery),
    responses(
        (status = 200, description = "Whether the tenant's plan allows the feature", body = AccessCheck),
        (status = 400, description = "Unknown feature")
    ),
    security(("api_jwt" = []))
)]
pub async fn check_plan(
    State(app_state): State<AppState>,
    Caller(access): Caller,
    Query(query): Query<PlanCheckQuery>,
) -> Result<impl IntoResponse, AppError> {
    let check = app_state
        .plan_service
        .check_feature(&access.tenant_id, query.feature)
        .await?;

    Ok(success(check))
}
