// src/handlers/purchase_orders.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
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
    middleware::rbac::{
        PermInventoryRead, PermPurchaseOrdersApprove, PermPurchaseOrdersCreate,
        PermPurchaseOrdersReceive, PermPurchaseOrdersSend, RequirePermission,
    },
    models::purchase_order::{
        ApprovalDecision, PurchaseOrder, PurchaseOrderDetail, PurchaseOrderLine,
        PurchaseOrderStatus, ReceiptLine,
    },
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderLinePayload {
    pub product_id: Uuid,
    #[schema(example = 100)]
    pub quantity: i32,
    #[serde(default)]
    #[schema(value_type = f64, example = 250.0)]
    pub unit_cost: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePurchaseOrderPayload {
    pub supplier_id: Uuid,
    pub branch_id: Uuid,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "items must contain at least one product"))]
    pub items: Vec<OrderLinePayload>,
}

// POST /api/purchase-orders
#[utoipa::path(
    post,
    path = "/api/purchase-orders",
    tag = "Purchase Orders",
    request_body = CreatePurchaseOrderPayload,
    responses(
        (status = 201, description = "Purchase order drafted", body = PurchaseOrderDetail)
    ),
    security(("api_jwt" = []))
)]
pub async fn create_purchase_order(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermPurchaseOrdersCreate>,
    Json(payload): Json<CreatePurchaseOrderPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let lines: Vec<PurchaseOrderLine> = payload
        .items
        .iter()
        .map(|i| PurchaseOrderLine {
            product_id: i.product_id,
            quantity: i.quantity,
            unit_cost: i.unit_cost,
        })
        .collect();

    let order = app_state
        .purchase_order_service
        .create_purchase_order(
            &access.tenant_id,
            &access.user_id,
            payload.supplier_id,
            payload.branch_id,
            payload.notes.as_deref(),
            &lines,
        )
        .await?;

    Ok((StatusCode::CREATED, success(order)))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PurchaseOrderListQuery {
    pub status: Option<PurchaseOrderStatus>,
}

// GET /api/purchase-orders
#[utoipa::path(
    get,
    path = "/api/purchase-orders",
    tag = "Purchase Orders",
    params(PurchaseOrderListQuery),
    responses((status = 200, description = "Purchase orders, newest first", body = [PurchaseOrder])),
    security(("api_jwt" = []))
)]
pub async fn list_purchase_orders(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermInventoryRead>,
    Query(query): Query<PurchaseOrderListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let orders = app_state
        .purchase_order_service
        .list_purchase_orders(&access.tenant_id, query.status)
        .await?;

    Ok(success(orders))
}

// GET /api/purchase-orders/{po_id}
#[utoipa::path(
    get,
    path = "/api/purchase-orders/{po_id}",
    tag = "Purchase Orders",
    params(("po_id" = Uuid, Path, description = "Purchase order")),
    responses(
        (status = 200, description = "Purchase order with its lines", body = PurchaseOrderDetail),
        (status = 404, description = "Not found in the caller's tenant")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_purchase_order(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermInventoryRead>,
    Path(po_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let order = app_state
        .purchase_order_service
        .get_purchase_order(&access.tenant_id, po_id)
        .await?;

    Ok(success(order))
}

// POST /api/purchase-orders/{po_id}/submit
#[utoipa::path(
    post,
    path = "/api/purchase-orders/{po_id}/submit",
    tag = "Purchase Orders",
    params(("po_id" = Uuid, Path, description = "Purchase order")),
    responses(
        (status = 200, description = "Submitted for approval", body = PurchaseOrder),
        (status = 400, description = "Not a DRAFT"),
        (status = 404, description = "Not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn submit_purchase_order(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermPurchaseOrdersCreate>,
    Path(po_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let order = app_state
        .purchase_order_service
        .submit_purchase_order(po_id, &access.tenant_id)
        .await?;

    Ok(success(order))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovePurchaseOrderPayload {
    pub approved: bool,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
}

// POST /api/purchase-orders/{po_id}/approve
#[utoipa::path(
    post,
    path = "/api/purchase-orders/{po_id}/approve",
    tag = "Purchase Orders",
    request_body = ApprovePurchaseOrderPayload,
    params(("po_id" = Uuid, Path, description = "Purchase order")),
    responses(
        (status = 200, description = "Decision recorded", body = PurchaseOrder),
        (status = 400, description = "Self-approval, missing reason or not PENDING"),
        (status = 404, description = "Not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn approve_purchase_order(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermPurchaseOrdersApprove>,
    Path(po_id): Path<Uuid>,
    Json(payload): Json<ApprovePurchaseOrderPayload>,
) -> Result<impl IntoResponse, AppError> {
    let decision = ApprovalDecision {
        approved: payload.approved,
        rejection_reason: payload.rejection_reason,
        notes: payload.notes,
    };

    let order = app_state
        .purchase_order_service
        .approve_purchase_order(po_id, &access.tenant_id, &access.user_id, &decision)
        .await?;

    Ok(success(order))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendPurchaseOrderPayload {
    /// Now when omitted.
    pub sent_at: Option<DateTime<Utc>>,
    pub supplier_notes: Option<String>,
}

// POST /api/purchase-orders/{po_id}/send
#[utoipa::path(
    post,
    path = "/api/purchase-orders/{po_id}/send",
    tag = "Purchase Orders",
    request_body = SendPurchaseOrderPayload,
    params(("po_id" = Uuid, Path, description = "Purchase order")),
    responses(
        (status = 200, description = "Sent to the supplier", body = PurchaseOrder),
        (status = 400, description = "Not APPROVED"),
        (status = 404, description = "Not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn send_purchase_order(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermPurchaseOrdersSend>,
    Path(po_id): Path<Uuid>,
    Json(payload): Json<SendPurchaseOrderPayload>,
) -> Result<impl IntoResponse, AppError> {
    let order = app_state
        .purchase_order_service
        .send_purchase_order(
            po_id,
            &access.tenant_id,
            payload.sent_at,
            payload.supplier_notes.as_deref(),
        )
        .await?;

    Ok(success(order))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedLinePayload {
    pub product_id: Uuid,
    #[schema(example = 90)]
    pub quantity_received: i32,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceivePurchaseOrderPayload {
    /// Lines left out are received as ordered.
    #[serde(default)]
    pub receipts: Vec<ReceivedLinePayload>,
}

// POST /api/purchase-orders/{po_id}/receive
#[utoipa::path(
    post,
    path = "/api/purchase-orders/{po_id}/receive",
    tag = "Purchase Orders",
    request_body = ReceivePurchaseOrderPayload,
    params(("po_id" = Uuid, Path, description = "Purchase order")),
    responses(
        (status = 200, description = "Delivery booked into the branch", body = [ReceiptLine]),
        (status = 400, description = "Invalid line or not SENT"),
        (status = 404, description = "Not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn receive_purchase_order(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermPurchaseOrdersReceive>,
    Path(po_id): Path<Uuid>,
    Json(payload): Json<ReceivePurchaseOrderPayload>,
) -> Result<impl IntoResponse, AppError> {
    let receipts: Vec<(Uuid, i32)> = payload
        .receipts
        .iter()
        .map(|r| (r.product_id, r.quantity_received))
        .collect();

    let (order, lines) = app_state
        .purchase_order_service
        .receive_purchase_order(po_id, &access.tenant_id, &receipts)
        .await?;

    Ok(success(serde_json::json!({ "purchaseOrder": order, "lines": lines })))
}
