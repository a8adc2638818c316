//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the health check, the WebSocket endpoint, OpenAPI documentation,
//! and the static client application shell.

use crate::{
    handlers,
    models::HealthResponse,
    state::AppState,
    ws::{root_handler, ws_handler},
};

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::health),
    components(schemas(HealthResponse)),
    tags(
        (name = "Chatvox API", description = "Voice chat relay service")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Unknown paths fall through to the client shell so client-side routes resolve.
    let static_dir = &app_state.config.static_dir;
    let client_shell =
        ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    let api_router = Router::new()
        .route("/api/health", get(handlers::health))
        .route("/", get(root_handler))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .fallback_service(client_shell)
}
