use crate::{
    entities::{customer, customer_price, order, product, wishlist_item},
    errors::ServiceError,
    handlers::common::{paginated, PaginationParams},
    services::customers::CustomerInput,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

/// Customers plus the per-customer views: prices, wishlist and orders
pub fn customers_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route("/by-user/:user_id", get(get_customer_by_user))
        .route(
            "/:id",
            get(get_customer)
                .put(update_customer)
                .delete(delete_customer),
        )
        .route("/:id/prices", get(list_customer_prices))
        .route("/:id/orders", get(list_customer_orders))
        .route("/:id/wishlist", get(list_wishlist))
        .route(
            "/:id/wishlist/:product_id",
            put(add_to_wishlist).delete(remove_from_wishlist),
        )
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CustomerListParams {
    /// Substring over name, email and company
    pub search: Option<String>,
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: PaginationParams,
}

#[utoipa::path(
    get,
    path = "/api/v1/customers",
    params(CustomerListParams),
    responses((status = 200, description = "Customers page", body = Object)),
    tag = "Customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    Query(params): Query<CustomerListParams>,
) -> ApiResult<PaginatedResponse<customer::Model>> {
    let (page, per_page) = params.pagination.normalized();
    let (items, total) = state
        .services
        .customers
        .list(params.search.as_deref(), page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(paginated(
        items, total, page, per_page,
    ))))
}

#[utoipa::path(
    post,
    path = "/api/v1/customers",
    request_body = CustomerInput,
    responses(
        (status = 201, description = "Customer created", body = Object),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse),
    ),
    tag = "Customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    Json(input): Json<CustomerInput>,
) -> Result<(StatusCode, Json<ApiResponse<customer::Model>>), ServiceError> {
    let created = state.services.customers.create(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer", body = Object),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<customer::Model> {
    Ok(Json(ApiResponse::success(
        state.services.customers.get(id).await?,
    )))
}

/// Customer record linked to an auth-platform user
#[utoipa::path(
    get,
    path = "/api/v1/customers/by-user/{user_id}",
    params(("user_id" = Uuid, Path, description = "Auth platform user id")),
    responses(
        (status = 200, description = "Customer", body = Object),
        (status = 404, description = "No customer for that user", body = crate::errors::ErrorResponse),
    ),
    tag = "Customers"
)]
pub async fn get_customer_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<customer::Model> {
    let customer = state
        .services
        .customers
        .find_by_user(user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("No customer for user {}", user_id)))?;
    Ok(Json(ApiResponse::success(customer)))
}

#[utoipa::path(
    put,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    request_body = CustomerInput,
    responses((status = 200, description = "Customer updated", body = Object)),
    tag = "Customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<CustomerInput>,
) -> ApiResult<customer::Model> {
    Ok(Json(ApiResponse::success(
        state.services.customers.update(id, input).await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses((status = 204, description = "Customer deleted")),
    tag = "Customers"
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.customers.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}/prices",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses((status = 200, description = "Fixed prices of the customer", body = Object)),
    tag = "Customers"
)]
pub async fn list_customer_prices(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<customer_price::Model>> {
    Ok(Json(ApiResponse::success(
        state.services.customer_prices.list_for_customer(id).await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}/orders",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses((status = 200, description = "Orders of the customer, newest first", body = Object)),
    tag = "Customers"
)]
pub async fn list_customer_orders(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<order::Model>> {
    Ok(Json(ApiResponse::success(
        state.services.orders.orders_for_customer(id).await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}/wishlist",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses((status = 200, description = "Wishlisted products", body = Object)),
    tag = "Customers"
)]
pub async fn list_wishlist(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<product::Model>> {
    Ok(Json(ApiResponse::success(
        state.services.wishlist.list(id).await?,
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/customers/{id}/wishlist/{product_id}",
    params(
        ("id" = Uuid, Path, description = "Customer id"),
        ("product_id" = Uuid, Path, description = "Product id"),
    ),
    responses((status = 200, description = "Product is in the wishlist", body = Object)),
    tag = "Customers"
)]
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    Path((id, product_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<wishlist_item::Model> {
    Ok(Json(ApiResponse::success(
        state.services.wishlist.add(id, product_id).await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/customers/{id}/wishlist/{product_id}",
    params(
        ("id" = Uuid, Path, description = "Customer id"),
        ("product_id" = Uuid, Path, description = "Product id"),
    ),
    responses(
        (status = 204, description = "Removed"),
        (status = 404, description = "Product was not in the wishlist", body = crate::errors::ErrorResponse),
    ),
    tag = "Customers"
)]
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    Path((id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ServiceError> {
    if state.services.wishlist.remove(id, product_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServiceError::NotFound(format!(
            "Product {} is not in the wishlist",
            product_id
        )))
    }
}
