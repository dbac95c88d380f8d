use crate::{
    entities::{inventory_movement, order, order_status_history, OrderStatus},
    errors::ServiceError,
    handlers::common::{paginated, parse_optional, PaginationParams},
    middleware_helpers::Actor,
    services::{
        messaging,
        order_status::allowed_transitions,
        orders::{CheckoutRequest, CheckoutResponse, OrderDetail},
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/checkout", post(checkout))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_order_status))
        .route("/:id/history", get(get_order_history))
        .route("/:id/transitions", get(get_allowed_transitions))
        .route("/:id/movements", get(get_order_movements))
        .route("/:id/handoff", get(get_order_handoff))
}

/// Places an order from the cart and returns the WhatsApp handoff link
#[utoipa::path(
    post,
    path = "/api/v1/orders/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<CheckoutResponse>),
        (status = 400, description = "Empty cart or invalid contact data", body = crate::errors::ErrorResponse),
        (status = 404, description = "A line references an unknown product", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutResponse>>), ServiceError> {
    let response = state.services.orders.checkout(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderListParams {
    /// One of pending, preparing, ready, shipped, delivered, cancelled
    pub status: Option<String>,
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: PaginationParams,
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderListParams),
    responses(
        (status = 200, description = "Orders, newest first", body = Object),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<OrderListParams>,
) -> ApiResult<PaginatedResponse<order::Model>> {
    let status: Option<OrderStatus> = parse_optional(params.status.as_deref(), "status")?;
    let (page, per_page) = params.pagination.normalized();
    let (items, total) = state
        .services
        .orders
        .list_orders(status, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(paginated(
        items, total, page, per_page,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with items and history", body = ApiResponse<OrderDetail>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    Ok(Json(ApiResponse::success(
        state.services.orders.get_order(id).await?,
    )))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

/// Moves the order through its workflow.
///
/// Delivering decrements stock; undoing a delivery restores it.
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = StatusUpdate,
    responses(
        (status = 200, description = "Order after the transition", body = ApiResponse<OrderDetail>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<OrderDetail> {
    update.validate()?;
    state
        .services
        .order_status
        .update_status(id, update.status, actor.user_id(), update.note)
        .await?;
    Ok(Json(ApiResponse::success(
        state.services.orders.get_order(id).await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/history",
    params(("id" = Uuid, Path, description = "Order id")),
    responses((status = 200, description = "Status history, oldest first", body = Object)),
    tag = "Orders"
)]
pub async fn get_order_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<order_status_history::Model>> {
    Ok(Json(ApiResponse::success(
        state.services.order_status.history(id).await?,
    )))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransitionOption {
    pub status: OrderStatus,
    pub label: &'static str,
    pub color: &'static str,
}

/// Statuses the order can move to from where it is now
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/transitions",
    params(("id" = Uuid, Path, description = "Order id")),
    responses((status = 200, description = "Allowed next statuses", body = ApiResponse<Vec<TransitionOption>>)),
    tag = "Orders"
)]
pub async fn get_allowed_transitions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<TransitionOption>> {
    let detail = state.services.orders.get_order(id).await?;
    let options = allowed_transitions(detail.order.status)
        .into_iter()
        .map(|status| TransitionOption {
            status,
            label: status.label(),
            color: status.badge_color(),
        })
        .collect();
    Ok(Json(ApiResponse::success(options)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/movements",
    params(("id" = Uuid, Path, description = "Order id")),
    responses((status = 200, description = "Stock movements caused by the order", body = Object)),
    tag = "Orders"
)]
pub async fn get_order_movements(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<inventory_movement::Model>> {
    Ok(Json(ApiResponse::success(
        state.services.inventory.movements_for_order(id).await?,
    )))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Handoff {
    pub message: String,
    pub whatsapp_url: String,
}

/// Rebuilds the WhatsApp message of an existing order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/handoff",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Message and deep link", body = ApiResponse<Handoff>),
        (status = 503, description = "No WhatsApp number configured", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order_handoff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Handoff> {
    let detail = state.services.orders.get_order(id).await?;
    let message = messaging::order_message(&detail.order, &detail.items);
    let whatsapp_url = messaging::whatsapp_link(&state.config.contact, &message)?;
    Ok(Json(ApiResponse::success(Handoff {
        message,
        whatsapp_url,
    })))
}
