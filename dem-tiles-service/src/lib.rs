//! dem-tiles service library
//!
//! HTTP handlers and router for the batch elevation service.
//! This library is used by both the dem-tiles-service binary and integration tests.

pub mod handlers;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use dem_tiles::protocol::MAX_INPUT_SIZE;
use dem_tiles::DirTileStore;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across handlers.
pub struct AppState {
    /// Tile store opened at startup, shared by all requests.
    pub store: Arc<DirTileStore>,
    /// Tiles cached per request.
    pub cache_size: usize,
}

/// OpenAPI documentation for the elevation service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "dem-tiles Elevation Service",
        version = "0.1.0",
        description = "Batch point-elevation queries over a tiled elevation store.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(handlers::post_elevation, handlers::health_check),
    components(schemas(handlers::HealthResponse)),
    tags(
        (name = "elevation", description = "Elevation query endpoints"),
        (name = "system", description = "System and health endpoints")
    )
)]
pub struct ApiDoc;

/// Build the service router with docs, tracing and CORS.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", post(handlers::post_elevation))
        .route("/health", get(handlers::health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(DefaultBodyLimit::max(MAX_INPUT_SIZE)),
        )
        .with_state(state)
}

// Re-export commonly used types for convenience
pub use handlers::HealthResponse;
