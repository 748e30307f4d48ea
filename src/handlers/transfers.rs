// src/handlers/transfers.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
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
        PermInventoryRead, PermTransfersApprove, PermTransfersReceive, PermTransfersRequest,
        PermTransfersShip, RequirePermission,
    },
    models::transfer::{BranchTransfer, ShipmentDetails, TransferDetail, TransferLine, TransferStatus},
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestedItem {
    pub product_id: Uuid,
    #[schema(example = 20)]
    pub requested_quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestTransferPayload {
    pub source_branch_id: Uuid,
    pub dest_branch_id: Uuid,
    #[validate(length(min = 1, message = "items must contain at least one product"))]
    pub items: Vec<RequestedItem>,
}

// POST /api/transfers
#[utoipa::path(
    post,
    path = "/api/transfers",
    tag = "Transfers",
    request_body = RequestTransferPayload,
    responses(
        (status = 201, description = "Transfer requested", body = TransferDetail),
        (status = 400, description = "Same branch, empty or duplicate items")
    ),
    security(("api_jwt" = []))
)]
pub async fn request_transfer(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermTransfersRequest>,
    Json(payload): Json<RequestTransferPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let lines: Vec<TransferLine> = payload
        .items
        .iter()
        .map(|i| TransferLine {
            product_id: i.product_id,
            quantity: i.requested_quantity,
        })
        .collect();

    let transfer = app_state
        .transfer_service
        .request_transfer(
            &access.tenant_id,
            &access.user_id,
            payload.source_branch_id,
            payload.dest_branch_id,
            &lines,
        )
        .await?;

    Ok((StatusCode::CREATED, success(transfer)))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransferListQuery {
    pub status: Option<TransferStatus>,
}

// GET /api/transfers
#[utoipa::path(
    get,
    path = "/api/transfers",
    tag = "Transfers",
    params(TransferListQuery),
    responses((status = 200, description = "Transfers, newest first", body = [BranchTransfer])),
    security(("api_jwt" = []))
)]
pub async fn list_transfers(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermInventoryRead>,
    Query(query): Query<TransferListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let transfers = app_state
        .transfer_service
        .list_transfers(&access.tenant_id, query.status)
        .await?;

    Ok(success(transfers))
}

// GET /api/transfers/{transfer_id}
#[utoipa::path(
    get,
    path = "/api/transfers/{transfer_id}",
    tag = "Transfers",
    params(("transfer_id" = Uuid, Path, description = "Transfer")),
    responses(
        (status = 200, description = "Transfer with its lines", body = TransferDetail),
        (status = 404, description = "Not found in the caller's tenant")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_transfer(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermInventoryRead>,
    Path(transfer_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let transfer = app_state
        .transfer_service
        .get_transfer(&access.tenant_id, transfer_id)
        .await?;

    Ok(success(transfer))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalItem {
    pub product_id: Uuid,
    #[schema(example = 15)]
    pub approved_quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApproveTransferPayload {
    #[validate(length(min = 1, message = "approvals must contain at least one item"))]
    pub approvals: Vec<ApprovalItem>,
}

// POST /api/transfers/{transfer_id}/approve
#[utoipa::path(
    post,
    path = "/api/transfers/{transfer_id}/approve",
    tag = "Transfers",
    request_body = ApproveTransferPayload,
    params(("transfer_id" = Uuid, Path, description = "Transfer")),
    responses(
        (status = 200, description = "Transfer approved", body = TransferDetail),
        (status = 400, description = "Invalid item or transfer not REQUESTED"),
        (status = 404, description = "Not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn approve_transfer(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermTransfersApprove>,
    Path(transfer_id): Path<Uuid>,
    Json(payload): Json<ApproveTransferPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let approvals: Vec<TransferLine> = payload
        .approvals
        .iter()
        .map(|a| TransferLine {
            product_id: a.product_id,
            quantity: a.approved_quantity,
        })
        .collect();

    let transfer = app_state
        .transfer_service
        .approve_transfer(transfer_id, &access.tenant_id, &access.user_id, &approvals)
        .await?;

    Ok(success(transfer))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectTransferPayload {
    #[validate(length(min = 1, message = "rejectionReason is required"))]
    pub rejection_reason: String,
}

// POST /api/transfers/{transfer_id}/reject
#[utoipa::path(
    post,
    path = "/api/transfers/{transfer_id}/reject",
    tag = "Transfers",
    request_body = RejectTransferPayload,
    params(("transfer_id" = Uuid, Path, description = "Transfer")),
    responses(
        (status = 200, description = "Transfer rejected", body = BranchTransfer),
        (status = 400, description = "Missing reason or transfer already shipped"),
        (status = 404, description = "Not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn reject_transfer(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermTransfersApprove>,
    Path(transfer_id): Path<Uuid>,
    Json(payload): Json<RejectTransferPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let transfer = app_state
        .transfer_service
        .reject_transfer(transfer_id, &access.tenant_id, &payload.rejection_reason)
        .await?;

    Ok(success(transfer))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipTransferPayload {
    /// Defaults to the caller.
    pub shipped_by: Option<String>,
    pub tracking_number: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`, strictly in the future.
    #[schema(example = "2026-11-02")]
    pub estimated_arrival: Option<String>,
}

// POST /api/transfers/{transfer_id}/ship
#[utoipa::path(
    post,
    path = "/api/transfers/{transfer_id}/ship",
    tag = "Transfers",
    request_body = ShipTransferPayload,
    params(("transfer_id" = Uuid, Path, description = "Transfer")),
    responses(
        (status = 200, description = "Stock left the source branch", body = TransferDetail),
        (status = 400, description = "Invalid date, insufficient stock or transfer not APPROVED"),
        (status = 404, description = "Not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn ship_transfer(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermTransfersShip>,
    Path(transfer_id): Path<Uuid>,
    Json(payload): Json<ShipTransferPayload>,
) -> Result<impl IntoResponse, AppError> {
    let shipment = ShipmentDetails {
        shipped_by: payload
            .shipped_by
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| access.user_id.clone()),
        tracking_number: payload.tracking_number.filter(|s| !s.trim().is_empty()),
        estimated_arrival: payload.estimated_arrival,
    };

    let transfer = app_state
        .transfer_service
        .ship_transfer(transfer_id, &access.tenant_id, &shipment)
        .await?;

    Ok(success(transfer))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptItem {
    pub product_id: Uuid,
    #[schema(example = 14)]
    pub received_quantity: i32,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveTransferPayload {
    /// Lines left out are received in full.
    #[serde(default)]
    pub receipts: Vec<ReceiptItem>,
}

// POST /api/transfers/{transfer_id}/receive
#[utoipa::path(
    post,
    path = "/api/transfers/{transfer_id}/receive",
    tag = "Transfers",
    request_body = ReceiveTransferPayload,
    params(("transfer_id" = Uuid, Path, description = "Transfer")),
    responses(
        (status = 200, description = "Stock booked at the destination", body = TransferDetail),
        (status = 400, description = "Received more than shipped or transfer not SHIPPED"),
        (status = 404, description = "Not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn receive_transfer(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermTransfersReceive>,
    Path(transfer_id): Path<Uuid>,
    Json(payload): Json<ReceiveTransferPayload>,
) -> Result<impl IntoResponse, AppError> {
    let receipts: Vec<TransferLine> = payload
        .receipts
        .iter()
        .map(|r| TransferLine {
            product_id: r.product_id,
            quantity: r.received_quantity,
        })
        .collect();

    let transfer = app_state
        .transfer_service
        .receive_transfer(transfer_id, &access.tenant_id, &access.user_id, &receipts)
        .await?;

    Ok(success(transfer))
}
