//! Axum Handlers for the REST API
//!
//! The REST surface is limited to a liveness probe. It uses `utoipa` doc
//! comments to generate OpenAPI documentation.

use axum::response::Json;

use crate::models::HealthResponse;

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "The service is running", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
