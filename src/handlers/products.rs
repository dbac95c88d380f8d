use crate::{
    entities::product,
    handlers::common::{paginated, PaginationParams},
    middleware_helpers::Actor,
    services::products::{ProductDetail, ProductInput, ProductRemoval},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

/// Back-office product administration
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(PaginationParams),
    responses((status = 200, description = "Products page", body = Object)),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<product::Model>> {
    let (page, per_page) = params.normalized();
    let (items, total) = state.services.products.list(page, per_page).await?;
    Ok(Json(ApiResponse::success(paginated(
        items, total, page, per_page,
    ))))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = ProductInput,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductDetail>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 409, description = "Slug already taken", body = crate::errors::ErrorResponse),
    ),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<ApiResponse<ProductDetail>>), crate::errors::ServiceError> {
    let detail = state
        .services
        .products
        .create(input, actor.user_id())
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(detail))))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product detail", body = ApiResponse<ProductDetail>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductDetail> {
    Ok(Json(ApiResponse::success(
        state.services.products.get(id).await?,
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = ProductInput,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductDetail>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(input): Json<ProductInput>,
) -> ApiResult<ProductDetail> {
    let detail = state
        .services
        .products
        .update(id, input, actor.user_id())
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Deletes the product, or archives it when stock movements or orders reference it
#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Deleted or archived", body = ApiResponse<ProductRemoval>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductRemoval> {
    let removal = state.services.products.delete(id).await?;
    Ok(Json(ApiResponse::success(removal)))
}
