use crate::{ApiResponse, ApiResult, AppState};
use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

/// Storefront contact block, with the plain chat link (no message)
#[derive(Debug, Serialize, ToSchema)]
pub struct ContactInfo {
    pub whatsapp_phone: String,
    pub whatsapp_handle: String,
    pub whatsapp_url: Option<String>,
    pub email: String,
    pub address: String,
    pub map_lat: f64,
    pub map_lng: f64,
}

#[utoipa::path(
    get,
    path = "/api/v1/contact",
    responses((status = 200, description = "Configured contact details", body = ApiResponse<ContactInfo>)),
    tag = "System"
)]
pub async fn contact_info(State(state): State<AppState>) -> ApiResult<ContactInfo> {
    let contact = &state.config.contact;
    let digits = contact.whatsapp_digits();
    Ok(Json(ApiResponse::success(ContactInfo {
        whatsapp_phone: contact.whatsapp_phone.clone(),
        whatsapp_handle: contact.whatsapp_handle.clone(),
        whatsapp_url: (!digits.is_empty()).then(|| format!("https://wa.me/{}", digits)),
        email: contact.email.clone(),
        address: contact.address.clone(),
        map_lat: contact.map_lat,
        map_lng: contact.map_lng,
    })))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_latency_ms: Option<u64>,
    pub version: &'static str,
    pub environment: String,
    pub timestamp: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses((status = 200, description = "Service and database status", body = ApiResponse<HealthStatus>)),
    tag = "System"
)]
pub async fn health_check(State(state): State<AppState>) -> ApiResult<HealthStatus> {
    let latency = crate::db::check_connection(&state.db).await.ok();
    let database = if latency.is_some() {
        "healthy"
    } else {
        "unhealthy"
    };

    Ok(Json(ApiResponse::success(HealthStatus {
        status: if database == "healthy" {
            "healthy"
        } else {
            "degraded"
        },
        database,
        database_latency_ms: latency.map(|d| d.as_millis() as u64),
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        timestamp: Utc::now().to_rfc3339(),
    })))
}
