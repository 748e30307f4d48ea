// src/handlers/stock.rs

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::{
        error::AppError,
        extract::{Json, Query},
        response::{parse_uuid_list, success},
    },
    config::AppState,
    middleware::rbac::{PermInventoryRead, PermInventoryWrite, RequirePermission},
    models::{
        inventory::{MovementFilter, MovementType, StockLevel, StockMovement},
        plan::Feature,
    },
    services::inventory_service::StockAdjustment,
};

const DEFAULT_MOVEMENT_LIMIT: i64 = 100;
const MAX_MOVEMENT_LIMIT: i64 = 500;

fn validate_non_zero(val: i32) -> Result<(), ValidationError> {
    if val == 0 {
        let mut err = ValidationError::new("non_zero");
        err.message = Some("quantity must be a non-zero number".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockPayload {
    pub product_id: Uuid,
    pub branch_id: Uuid,
    /// Signed delta applied to current stock.
    #[validate(custom(function = "validate_non_zero"))]
    #[schema(example = -5)]
    pub quantity: i32,
    #[validate(length(min = 1, message = "reason is required"))]
    #[schema(example = "damaged in storage")]
    pub reason: String,
}

// POST /api/stock/adjust
#[utoipa::path(
    post,
    path = "/api/stock/adjust",
    tag = "Stock",
    request_body = AdjustStockPayload,
    responses(
        (status = 200, description = "Level and the movement that changed it", body = StockLevel),
        (status = 400, description = "Missing field, non-number quantity or stock would go negative"),
        (status = 404, description = "No stock level for this product at this branch")
    ),
    security(("api_jwt" = []))
)]
pub async fn adjust_stock(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermInventoryWrite>,
    Json(payload): Json<AdjustStockPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let adjustment = StockAdjustment {
        product_id: payload.product_id,
        branch_id: payload.branch_id,
        quantity: payload.quantity,
        reason: payload.reason.trim().to_string(),
    };

    let (level, movement) = app_state
        .inventory_service
        .adjust_stock(&access.tenant_id, &adjustment)
        .await?;

    Ok(success(serde_json::json!({ "stockLevel": level, "movement": movement })))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordSalePayload {
    pub product_id: Uuid,
    pub branch_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

// POST /api/stock/sale
#[utoipa::path(
    post,
    path = "/api/stock/sale",
    tag = "Stock",
    request_body = RecordSalePayload,
    responses(
        (status = 200, description = "Sale booked against available stock", body = StockMovement),
        (status = 400, description = "Insufficient available stock"),
        (status = 403, description = "Daily sales limit of the plan reached")
    ),
    security(("api_jwt" = []))
)]
pub async fn record_sale(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermInventoryWrite>,
    Json(payload): Json<RecordSalePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    app_state
        .plan_service
        .ensure_allowed(&access.tenant_id, Feature::DailySales)
        .await?;

    let (level, movement) = app_state
        .inventory_service
        .record_sale(&access.tenant_id, payload.product_id, payload.branch_id, payload.quantity)
        .await?;

    Ok(success(serde_json::json!({ "stockLevel": level, "movement": movement })))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StockLevelsQuery {
    pub branch_id: Option<Uuid>,
    /// Comma separated product ids.
    pub product_ids: Option<String>,
}

// GET /api/stock/levels
#[utoipa::path(
    get,
    path = "/api/stock/levels",
    tag = "Stock",
    params(StockLevelsQuery),
    responses(
        (status = 200, description = "Stock levels of the caller's tenant", body = [StockLevel])
    ),
    security(("api_jwt" = []))
)]
pub async fn get_stock_levels(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermInventoryRead>,
    Query(query): Query<StockLevelsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let product_ids = query
        .product_ids
        .as_deref()
        .map(|raw| parse_uuid_list(raw, "productIds"))
        .transpose()?;

    let levels = app_state
        .inventory_service
        .get_stock_levels(&access.tenant_id, query.branch_id, product_ids)
        .await?;

    Ok(success(levels))
}

// GET /api/stock/levels/{product_id}/{branch_id}
#[utoipa::path(
    get,
    path = "/api/stock/levels/{product_id}/{branch_id}",
    tag = "Stock",
    params(
        ("product_id" = Uuid, Path, description = "Product"),
        ("branch_id" = Uuid, Path, description = "Branch")
    ),
    responses(
        (status = 200, description = "Stock level", body = StockLevel),
        (status = 404, description = "No level recorded")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_stock_level(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermInventoryRead>,
    Path((product_id, branch_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let level = app_state
        .inventory_service
        .get_stock_level(&access.tenant_id, product_id, branch_id)
        .await?
        .ok_or_else(|| AppError::not_found("Stock level"))?;

    Ok(success(level))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct MovementsQuery {
    pub branch_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    /// Defaults to 100, capped at 500.
    pub limit: Option<i64>,
}

// GET /api/stock/movements
#[utoipa::path(
    get,
    path = "/api/stock/movements",
    tag = "Stock",
    params(MovementsQuery),
    responses(
        (status = 200, description = "Movement history, newest first", body = [StockMovement])
    ),
    security(("api_jwt" = []))
)]
pub async fn list_movements(
    State(app_state): State<AppState>,
    RequirePermission(access, _): RequirePermission<PermInventoryRead>,
    Query(query): Query<MovementsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = MovementFilter {
        branch_id: query.branch_id,
        product_id: query.product_id,
        movement_type: query.movement_type,
        limit: query
            .limit
            .unwrap_or(DEFAULT_MOVEMENT_LIMIT)
            .clamp(1, MAX_MOVEMENT_LIMIT),
    };

    let movements = app_state
        .inventory_service
        .list_movements(&access.tenant_id, &filter)
        .await?;

    Ok(success(movements))
}
