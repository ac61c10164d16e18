use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use utoipa::ToSchema;

use crate::error::ApiError;

pub mod auth;
pub mod products;
pub mod users;

/// Milliseconds since `started`, for the completion log of mutating handlers.
pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// ServiceInfo
///
/// Banner returned by `GET /`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    pub status: String,
    pub message: String,
    pub version: String,
    pub endpoints: ServiceEndpoints,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceEndpoints {
    pub health: String,
    pub auth: String,
    pub products: String,
    pub users: String,
    pub docs: String,
}

/// HealthResponse
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// root
///
/// [Public Route] Service banner listing the top-level endpoints.
#[utoipa::path(
    get,
    path = "/",
    tag = "system",
    responses((status = 200, description = "Service banner", body = ServiceInfo))
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        status: "ok".to_string(),
        message: "API EduPlay Chile".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: ServiceEndpoints {
            health: "/api/health".to_string(),
            auth: "/api/auth".to_string(),
            products: "/api/products".to_string(),
            users: "/api/users".to_string(),
            docs: "/swagger-ui".to_string(),
        },
    })
}

/// health
///
/// [Public Route] Liveness probe, mounted at `/health` and `/api/health`.
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "system",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "API funcionando correctamente".to_string(),
        timestamp: Utc::now(),
    })
}

/// Router fallback for unknown paths.
pub async fn not_found() -> ApiError {
    ApiError::not_found("Ruta no encontrada")
}
