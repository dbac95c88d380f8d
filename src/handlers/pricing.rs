use crate::{
    entities::{customer_price, discount},
    errors::ServiceError,
    services::{
        customer_prices::CustomerPriceInput, discounts::DiscountInput, pricing::PriceQuote,
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub fn pricing_routes() -> Router<AppState> {
    Router::new().route("/quote", get(quote_price))
}

pub fn discounts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_discounts).post(create_discount))
        .route("/active", get(list_active_discounts))
        .route(
            "/:id",
            get(get_discount)
                .put(update_discount)
                .delete(delete_discount),
        )
        .route("/:id/active", put(set_discount_active))
}

pub fn customer_prices_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_customer_prices).put(upsert_customer_price))
        .route("/:id", delete(delete_customer_price))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct QuoteParams {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// Resolves the unit price of a product for a buyer and quantity
#[utoipa::path(
    get,
    path = "/api/v1/pricing/quote",
    params(QuoteParams),
    responses(
        (status = 200, description = "Resolved price with its breakdown", body = ApiResponse<PriceQuote>),
        (status = 404, description = "Unknown product, variant or customer", body = crate::errors::ErrorResponse),
    ),
    tag = "Pricing"
)]
pub async fn quote_price(
    State(state): State<AppState>,
    Query(params): Query<QuoteParams>,
) -> ApiResult<PriceQuote> {
    let quote = state
        .services
        .pricing
        .quote(
            params.product_id,
            params.variant_id,
            params.customer_id,
            params.quantity,
        )
        .await?;
    Ok(Json(ApiResponse::success(quote)))
}

#[utoipa::path(
    get,
    path = "/api/v1/discounts",
    responses((status = 200, description = "All discounts", body = Object)),
    tag = "Pricing"
)]
pub async fn list_discounts(State(state): State<AppState>) -> ApiResult<Vec<discount::Model>> {
    Ok(Json(ApiResponse::success(
        state.services.discounts.list().await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/discounts/active",
    responses((status = 200, description = "Discounts active right now", body = Object)),
    tag = "Pricing"
)]
pub async fn list_active_discounts(
    State(state): State<AppState>,
) -> ApiResult<Vec<discount::Model>> {
    Ok(Json(ApiResponse::success(
        state.services.discounts.active_discounts(Utc::now()).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/discounts",
    request_body = DiscountInput,
    responses(
        (status = 201, description = "Discount created", body = Object),
        (status = 400, description = "Invalid discount", body = crate::errors::ErrorResponse),
    ),
    tag = "Pricing"
)]
pub async fn create_discount(
    State(state): State<AppState>,
    Json(input): Json<DiscountInput>,
) -> Result<(StatusCode, Json<ApiResponse<discount::Model>>), ServiceError> {
    let created = state.services.discounts.create(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/discounts/{id}",
    params(("id" = Uuid, Path, description = "Discount id")),
    responses((status = 200, description = "Discount", body = Object)),
    tag = "Pricing"
)]
pub async fn get_discount(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<discount::Model> {
    Ok(Json(ApiResponse::success(
        state.services.discounts.get(id).await?,
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/discounts/{id}",
    params(("id" = Uuid, Path, description = "Discount id")),
    request_body = DiscountInput,
    responses((status = 200, description = "Discount updated", body = Object)),
    tag = "Pricing"
)]
pub async fn update_discount(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<DiscountInput>,
) -> ApiResult<discount::Model> {
    Ok(Json(ApiResponse::success(
        state.services.discounts.update(id, input).await?,
    )))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ActiveFlag {
    pub active: bool,
}

#[utoipa::path(
    put,
    path = "/api/v1/discounts/{id}/active",
    params(("id" = Uuid, Path, description = "Discount id")),
    request_body = ActiveFlag,
    responses((status = 200, description = "Discount toggled", body = Object)),
    tag = "Pricing"
)]
pub async fn set_discount_active(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(flag): Json<ActiveFlag>,
) -> ApiResult<discount::Model> {
    Ok(Json(ApiResponse::success(
        state.services.discounts.set_active(id, flag.active).await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/discounts/{id}",
    params(("id" = Uuid, Path, description = "Discount id")),
    responses((status = 204, description = "Discount deleted")),
    tag = "Pricing"
)]
pub async fn delete_discount(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.discounts.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/customer-prices",
    responses((status = 200, description = "All customer prices", body = Object)),
    tag = "Pricing"
)]
pub async fn list_customer_prices(
    State(state): State<AppState>,
) -> ApiResult<Vec<customer_price::Model>> {
    Ok(Json(ApiResponse::success(
        state.services.customer_prices.list().await?,
    )))
}

/// Sets the fixed price of a product for one customer, replacing any previous one
#[utoipa::path(
    put,
    path = "/api/v1/customer-prices",
    request_body = CustomerPriceInput,
    responses(
        (status = 200, description = "Price stored", body = Object),
        (status = 400, description = "Negative price", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown customer or product", body = crate::errors::ErrorResponse),
    ),
    tag = "Pricing"
)]
pub async fn upsert_customer_price(
    State(state): State<AppState>,
    Json(input): Json<CustomerPriceInput>,
) -> ApiResult<customer_price::Model> {
    Ok(Json(ApiResponse::success(
        state.services.customer_prices.upsert(input).await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/customer-prices/{id}",
    params(("id" = Uuid, Path, description = "Customer price id")),
    responses((status = 204, description = "Customer price deleted")),
    tag = "Pricing"
)]
pub async fn delete_customer_price(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.customer_prices.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
