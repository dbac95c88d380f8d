use crate::{
    errors::ServiceError, middleware_helpers::Actor, services::csv_io::ImportSummary, ApiResponse,
    ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

pub fn csv_routes() -> Router<AppState> {
    Router::new()
        .route("/import/products", post(import_products))
        .route("/export/:resource", get(export_resource))
}

/// Imports products from CSV text; any bad row rejects the whole file
#[utoipa::path(
    post,
    path = "/api/v1/csv/import/products",
    request_body(content = String, content_type = "text/csv",
        description = "Columns name, price, stock, category; optional description, image_url"),
    responses(
        (status = 200, description = "Every row imported", body = ApiResponse<ImportSummary>),
        (status = 400, description = "Missing column or invalid row, nothing imported", body = crate::errors::ErrorResponse),
    ),
    tag = "CSV"
)]
pub async fn import_products(
    State(state): State<AppState>,
    actor: Actor,
    body: String,
) -> ApiResult<ImportSummary> {
    let summary = state
        .services
        .csv
        .import_products(&body, actor.user_id())
        .await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Exports `products`, `customers` or `orders` as CSV
#[utoipa::path(
    get,
    path = "/api/v1/csv/export/{resource}",
    params(("resource" = String, Path, description = "products, customers or orders")),
    responses(
        (status = 200, description = "CSV document", content_type = "text/csv", body = String),
        (status = 404, description = "Unknown resource", body = crate::errors::ErrorResponse),
    ),
    tag = "CSV"
)]
pub async fn export_resource(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> Result<Response, ServiceError> {
    let csv = &state.services.csv;
    let body = match resource.as_str() {
        "products" => csv.export_products().await?,
        "customers" => csv.export_customers().await?,
        "orders" => csv.export_orders().await?,
        other => {
            return Err(ServiceError::NotFound(format!(
                "Nothing to export named '{}'",
                other
            )))
        }
    };

    let filename = format!("{}-{}.csv", resource, Utc::now().format("%Y%m%d"));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}
