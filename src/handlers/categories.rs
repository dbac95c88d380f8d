use crate::{
    entities::category, errors::ServiceError, services::categories::CategoryInput, ApiResponse,
    ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

pub fn categories_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/:id",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
}

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses((status = 200, description = "All categories by name", body = Object)),
    tag = "Categories"
)]
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<category::Model>> {
    Ok(Json(ApiResponse::success(
        state.services.categories.list().await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    request_body = CategoryInput,
    responses(
        (status = 201, description = "Category created", body = Object),
        (status = 409, description = "Name or slug already used", body = crate::errors::ErrorResponse),
    ),
    tag = "Categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<ApiResponse<category::Model>>), ServiceError> {
    let created = state.services.categories.create(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category", body = Object),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<category::Model> {
    Ok(Json(ApiResponse::success(
        state.services.categories.get(id).await?,
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/categories/{id}",
    params(("id" = Uuid, Path, description = "Category id")),
    request_body = CategoryInput,
    responses((status = 200, description = "Category updated", body = Object)),
    tag = "Categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<CategoryInput>,
) -> ApiResult<category::Model> {
    Ok(Json(ApiResponse::success(
        state.services.categories.update(id, input).await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    params(("id" = Uuid, Path, description = "Category id")),
    responses((status = 204, description = "Category deleted")),
    tag = "Categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.categories.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
