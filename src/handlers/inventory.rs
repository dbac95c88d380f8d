use crate::{
    entities::{inventory_movement, product, stock_alert, MovementType},
    errors::ServiceError,
    middleware_helpers::Actor,
    services::inventory::{AlertSweep, MovementRequest},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/movements", post(record_movement))
        .route("/products/:id/movements", get(list_movements))
        .route("/products/:id/adjust", post(adjust_stock))
        .route("/low-stock", get(low_stock_products))
        .route("/alerts", get(open_alerts))
        .route("/alerts/check", post(check_alerts))
        .route("/alerts/:id/notified", post(mark_alert_notified))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MovementPayload {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub movement_type: MovementType,
    /// Units moved; positive except for adjustments, which carry a signed delta
    pub quantity: i32,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// Records an entry, exit, sale, return or adjustment
#[utoipa::path(
    post,
    path = "/api/v1/inventory/movements",
    request_body = MovementPayload,
    responses(
        (status = 201, description = "Movement recorded", body = Object),
        (status = 400, description = "Quantity does not fit the movement type", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product or variant", body = crate::errors::ErrorResponse),
    ),
    tag = "Inventory"
)]
pub async fn record_movement(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<MovementPayload>,
) -> Result<(StatusCode, Json<ApiResponse<inventory_movement::Model>>), ServiceError> {
    payload.validate()?;
    let mut request = MovementRequest::new(
        payload.product_id,
        payload.movement_type,
        payload.quantity,
    )
    .for_variant(payload.variant_id)
    .by(actor.user_id());
    request.reason = payload.reason;

    let movement = state.services.inventory.apply_movement(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(movement))))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AdjustPayload {
    /// Signed change in units
    pub delta: i32,
    pub variant_id: Option<Uuid>,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/products/{id}/adjust",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = AdjustPayload,
    responses(
        (status = 201, description = "Adjustment recorded", body = Object),
        (status = 400, description = "Zero delta", body = crate::errors::ErrorResponse),
    ),
    tag = "Inventory"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(payload): Json<AdjustPayload>,
) -> Result<(StatusCode, Json<ApiResponse<inventory_movement::Model>>), ServiceError> {
    payload.validate()?;
    let ledger = &state.services.inventory;
    let movement = match payload.variant_id {
        Some(variant_id) => {
            ledger
                .adjust_variant_stock(
                    id,
                    variant_id,
                    payload.delta,
                    payload.reason,
                    actor.user_id(),
                )
                .await?
        }
        None => {
            ledger
                .adjust_stock(id, payload.delta, payload.reason, actor.user_id())
                .await?
        }
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::success(movement))))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MovementListParams {
    pub limit: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/products/{id}/movements",
    params(("id" = Uuid, Path, description = "Product id"), MovementListParams),
    responses((status = 200, description = "Movements, newest first", body = ApiResponse<Vec<MovementView>>)),
    tag = "Inventory"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<MovementListParams>,
) -> ApiResult<Vec<MovementView>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let movements = state.services.inventory.list_movements(id, limit).await?;
    Ok(Json(ApiResponse::success(
        movements.into_iter().map(MovementView::from).collect(),
    )))
}

/// Movement row with its display label and icon
#[derive(Debug, Serialize, ToSchema)]
pub struct MovementView {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub movement: inventory_movement::Model,
    pub label: &'static str,
    pub icon: &'static str,
}

impl From<inventory_movement::Model> for MovementView {
    fn from(movement: inventory_movement::Model) -> Self {
        Self {
            label: movement.movement_type.label(),
            icon: movement.movement_type.icon(),
            movement,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/low-stock",
    responses((status = 200, description = "Products at or below their minimum", body = Object)),
    tag = "Inventory"
)]
pub async fn low_stock_products(State(state): State<AppState>) -> ApiResult<Vec<product::Model>> {
    Ok(Json(ApiResponse::success(
        state.services.inventory.low_stock_products().await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/alerts",
    responses((status = 200, description = "Unresolved stock alerts", body = Object)),
    tag = "Inventory"
)]
pub async fn open_alerts(State(state): State<AppState>) -> ApiResult<Vec<stock_alert::Model>> {
    Ok(Json(ApiResponse::success(
        state.services.inventory.open_alerts().await?,
    )))
}

/// Raises alerts for low products and resolves the ones that recovered
#[utoipa::path(
    post,
    path = "/api/v1/inventory/alerts/check",
    responses((status = 200, description = "Alerts raised and resolved by this pass", body = ApiResponse<AlertSweep>)),
    tag = "Inventory"
)]
pub async fn check_alerts(State(state): State<AppState>) -> ApiResult<AlertSweep> {
    Ok(Json(ApiResponse::success(
        state.services.inventory.check_stock_alerts().await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/alerts/{id}/notified",
    params(("id" = Uuid, Path, description = "Alert id")),
    responses((status = 200, description = "Alert marked as notified", body = Object)),
    tag = "Inventory"
)]
pub async fn mark_alert_notified(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<stock_alert::Model> {
    Ok(Json(ApiResponse::success(
        state.services.inventory.mark_alert_notified(id).await?,
    )))
}
