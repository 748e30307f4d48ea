// src/handlers/subscriptions.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::AppError,
        extract::{Json, Query},
        response::success,
    },
    config::AppState,
    middleware::rbac::{Caller, PermAdminSubscriptions, PermSubscriptionsManage, RequirePermission},
    models::subscription::{PlanType, Subscription, SubscriptionStatusView},
    services::access_service::ADMIN_SUBSCRIPTIONS,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionPayload {
    pub plan_type: PlanType,
}

// POST /api/subscriptions
#[utoipa::path(
    post,
    path = "/api/subscriptions",
    tag = "Subscriptions",
    request_body = CreateSubscriptionPayload,
    responses(
        (status = 201, description = "Pending subscription awaiting payment", body = Subscription)
    ),
    security(("api_jwt" = []))
)]
pub async fn create_subscription(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermSubscriptionsManage>,
    Json(payload): Json<CreateSubscriptionPayload>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = app_state
        .subscription_service
        .create_subscription(&access.tenant_id, payload.plan_type)
        .await?;

    Ok((StatusCode::CREATED, success(subscription)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivateSubscriptionPayload {
    /// Payment provider receipt, e.g. an M-Pesa transaction code.
    #[validate(length(min = 1, message = "transactionId is required"))]
    #[schema(example = "QKT4XYZ123")]
    pub transaction_id: String,
}

// POST /api/subscriptions/{subscription_id}/activate
#[utoipa::path(
    post,
    path = "/api/subscriptions/{subscription_id}/activate",
    tag = "Subscriptions",
    request_body = ActivateSubscriptionPayload,
    params(("subscription_id" = Uuid, Path, description = "Subscription")),
    responses(
        (status = 200, description = "Subscription active", body = Subscription),
        (status = 400, description = "Already active or not pending"),
        (status = 404, description = "Not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn activate_subscription(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermAdminSubscriptions>,
    Path(subscription_id): Path<Uuid>,
    Json(payload): Json<ActivateSubscriptionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let subscription = app_state
        .subscription_service
        .activate_subscription(subscription_id, &payload.transaction_id)
        .await?;

    Ok(success(subscription))
}

// POST /api/subscriptions/{subscription_id}/cancel
#[utoipa::path(
    post,
    path = "/api/subscriptions/{subscription_id}/cancel",
    tag = "Subscriptions",
    params(("subscription_id" = Uuid, Path, description = "Subscription")),
    responses(
        (status = 200, description = "Subscription cancelled", body = Subscription),
        (status = 400, description = "Already expired or cancelled"),
        (status = 404, description = "Not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_subscription(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermSubscriptionsManage>,
    Path(subscription_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = app_state
        .subscription_service
        .cancel_subscription(subscription_id, &access.tenant_id)
        .await?;

    Ok(success(subscription))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PaymentStatusQuery {
    pub subscription_id: Uuid,
}

// GET /api/mpesa/status
#[utoipa::path(
    get,
    path = "/api/mpesa/status",
    tag = "Subscriptions",
    params(PaymentStatusQuery),
    responses(
        (status = 200, description = "Payment status of a subscription", body = SubscriptionStatusView),
        (status = 404, description = "Not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn payment_status(
    State(app_state): State<AppState>,
    Caller(access): Caller,
    Query(query): Query<PaymentStatusQuery>,
) -> Result<impl IntoResponse, AppError> {
    // The platform admin can look up any tenant's payment
    let scope = if access.has_permission(ADMIN_SUBSCRIPTIONS) {
        None
    } else {
        Some(access.tenant_id.as_str())
    };

    let view = app_state
        .subscription_service
        .get_status(query.subscription_id, scope)
        .await?;

    Ok(Json(json!({
        "success": true,
        "subscriptionId": view.subscription_id,
        "status": view.status,
        "transactionId": view.transaction_id,
        "planType": view.plan_type,
        "endDate": view.end_date,
    })))
}
