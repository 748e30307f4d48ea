// src/handlers/inventory.rs

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, extract::Json, response::success},
    config::AppState,
    middleware::rbac::{PermInventoryAudit, PermInventoryWrite, RequirePermission},
    models::inventory::{InitializationReport, StockAlert, StockAuditDetail},
    services::inventory_service::{AlertGeneration, InitialStock, PhysicalCount, Reconciliation},
};

// ---
// Bulk initialization
// ---

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitialStockItem {
    pub product_id: Uuid,
    #[validate(range(min = 0, message = "initialStock cannot be negative"))]
    #[serde(default)]
    pub initial_stock: i32,
    #[validate(range(min = 0, message = "reorderPoint cannot be negative"))]
    #[serde(default)]
    pub reorder_point: i32,
    #[validate(range(min = 0, message = "reorderQuantity cannot be negative"))]
    #[serde(default)]
    pub reorder_quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitializeInventoryPayload {
    pub branch_id: Uuid,
    #[validate(length(min = 1, message = "items must contain at least one product"), nested)]
    pub items: Vec<InitialStockItem>,
}

// POST /api/inventory/initialize
#[utoipa::path(
    post,
    path = "/api/inventory/initialize",
    tag = "Inventory",
    request_body = InitializeInventoryPayload,
    responses(
        (status = 200, description = "Per-item outcome; failures do not abort the batch", body = InitializationReport)
    ),
    security(("api_jwt" = []))
)]
pub async fn initialize_inventory(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermInventoryWrite>,
    Json(payload): Json<InitializeInventoryPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let items: Vec<InitialStock> = payload
        .items
        .iter()
        .map(|i| InitialStock {
            product_id: i.product_id,
            initial_stock: i.initial_stock,
            reorder_point: i.reorder_point,
            reorder_quantity: i.reorder_quantity,
        })
        .collect();

    let report = app_state
        .inventory_service
        .initialize_inventory(&access.tenant_id, payload.branch_id, &items)
        .await?;

    Ok(success(report))
}

// ---
// Alerts
// ---

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAlertsPayload {
    /// All branches when omitted.
    pub branch_id: Option<Uuid>,
}

// POST /api/inventory/alerts/generate
#[utoipa::path(
    post,
    path = "/api/inventory/alerts/generate",
    tag = "Inventory",
    request_body = GenerateAlertsPayload,
    responses(
        (status = 200, description = "Active low stock alerts after the run", body = AlertGeneration)
    ),
    security(("api_jwt" = []))
)]
pub async fn generate_alerts(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermInventoryWrite>,
    Json(payload): Json<GenerateAlertsPayload>,
) -> Result<impl IntoResponse, AppError> {
    let generation = app_state
        .inventory_service
        .generate_low_stock_alerts(&access.tenant_id, payload.branch_id)
        .await?;

    Ok(success(generation))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeAlertPayload {
    #[validate(length(min = 1, message = "alertType is required"))]
    #[schema(example = "low_stock")]
    pub alert_type: String,
}

// POST /api/inventory/alerts/{alert_id}/acknowledge
#[utoipa::path(
    post,
    path = "/api/inventory/alerts/{alert_id}/acknowledge",
    tag = "Inventory",
    request_body = AcknowledgeAlertPayload,
    params(("alert_id" = Uuid, Path, description = "Alert")),
    responses(
        (status = 200, description = "Alert resolved", body = StockAlert),
        (status = 404, description = "No active alert of that type")
    ),
    security(("api_jwt" = []))
)]
pub async fn acknowledge_alert(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermInventoryWrite>,
    Path(alert_id): Path<Uuid>,
    Json(payload): Json<AcknowledgeAlertPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let alert = app_state
        .inventory_service
        .acknowledge_alert(alert_id, &access.tenant_id, payload.alert_type.trim(), &access.user_id)
        .await?;

    Ok(success(alert))
}

// ---
// Audits
// ---

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartAuditPayload {
    pub branch_id: Uuid,
    /// Whole branch when omitted.
    pub product_ids: Option<Vec<Uuid>>,
}

// POST /api/inventory/audits
#[utoipa::path(
    post,
    path = "/api/inventory/audits",
    tag = "Inventory",
    request_body = StartAuditPayload,
    responses(
        (status = 201, description = "Audit opened with a system stock snapshot", body = StockAuditDetail)
    ),
    security(("api_jwt" = []))
)]
pub async fn start_audit(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermInventoryAudit>,
    Json(payload): Json<StartAuditPayload>,
) -> Result<impl IntoResponse, AppError> {
    if payload.product_ids.as_ref().is_some_and(Vec::is_empty) {
        return Err(AppError::invalid("productIds cannot be empty when given"));
    }

    let audit = app_state
        .inventory_service
        .start_audit(&access.tenant_id, &access.user_id, payload.branch_id, payload.product_ids)
        .await?;

    Ok((axum::http::StatusCode::CREATED, success(audit)))
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalCountItem {
    pub product_id: Uuid,
    #[validate(range(min = 0, message = "physicalStock cannot be negative"))]
    pub physical_stock: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileAuditPayload {
    pub audit_id: Uuid,
    #[validate(length(min = 1, message = "items must contain at least one count"), nested)]
    pub items: Vec<PhysicalCountItem>,
}

// POST /api/inventory/audits/reconcile
#[utoipa::path(
    post,
    path = "/api/inventory/audits/reconcile",
    tag = "Inventory",
    request_body = ReconcileAuditPayload,
    responses(
        (status = 200, description = "Levels set to the physical counts", body = Reconciliation),
        (status = 400, description = "Invalid item, negative count or audit already reconciled"),
        (status = 404, description = "Audit not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn reconcile_audit(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermInventoryAudit>,
    Json(payload): Json<ReconcileAuditPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let counts: Vec<PhysicalCount> = payload
        .items
        .iter()
        .map(|i| PhysicalCount {
            product_id: i.product_id,
            physical_stock: i.physical_stock,
        })
        .collect();

    let reconciliation = app_state
        .inventory_service
        .reconcile_audit(&access.tenant_id, payload.audit_id, &counts)
        .await?;

    Ok(success(reconciliation))
}
