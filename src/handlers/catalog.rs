use crate::{
    entities::product,
    services::{
        catalog::{CatalogItem, CatalogPage, CatalogQuery},
        products::ProductDetail,
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, RawQuery, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Storefront catalog: browse, featured and product detail by slug
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(search_catalog))
        .route("/featured", get(featured_products))
        .route("/products/:slug", get(get_product_by_slug))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogResponse {
    #[schema(value_type = Object)]
    pub page: CatalogPage<CatalogItem>,
    /// Normalised filter state to put back in the browser URL
    pub query_string: String,
}

/// Search, filter, sort and paginate the active products
#[utoipa::path(
    get,
    path = "/api/v1/catalog",
    params(CatalogQuery),
    responses(
        (status = 200, description = "Catalog page", body = ApiResponse<CatalogResponse>),
        (status = 400, description = "Malformed filter value", body = crate::errors::ErrorResponse),
    ),
    tag = "Catalog"
)]
pub async fn search_catalog(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> ApiResult<CatalogResponse> {
    let query = CatalogQuery::from_query_string(raw.as_deref().unwrap_or(""))?;
    let page = state.services.catalog.search(&query).await?;
    Ok(Json(ApiResponse::success(CatalogResponse {
        page,
        query_string: query.to_query_string(),
    })))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct FeaturedParams {
    pub limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/api/v1/catalog/featured",
    params(FeaturedParams),
    responses((status = 200, description = "Featured products", body = Object)),
    tag = "Catalog"
)]
pub async fn featured_products(
    State(state): State<AppState>,
    Query(params): Query<FeaturedParams>,
) -> ApiResult<Vec<product::Model>> {
    let limit = params.limit.unwrap_or(8).clamp(1, 50);
    let products = state.services.catalog.featured(limit).await?;
    Ok(Json(ApiResponse::success(products)))
}

#[utoipa::path(
    get,
    path = "/api/v1/catalog/products/{slug}",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 200, description = "Product detail", body = ApiResponse<ProductDetail>),
        (status = 404, description = "Unknown or inactive product", body = crate::errors::ErrorResponse),
    ),
    tag = "Catalog"
)]
pub async fn get_product_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<ProductDetail> {
    Ok(Json(ApiResponse::success(
        state.services.products.get_by_slug(&slug).await?,
    )))
}
