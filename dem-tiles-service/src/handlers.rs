//! HTTP request handlers for the elevation service.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dem_tiles::protocol::{format_elevations, parse_points, ProtocolError, MAX_INPUT_POINTS};
use dem_tiles::ElevationQueryEngine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Plain-text response with the given status.
fn text_response(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body.into(),
    )
        .into_response()
}

/// Batch elevation query.
///
/// The body holds one `lat lon` pair per line; empty lines are ignored.
/// The response holds one elevation per line in the same order, `NULL`
/// where there is no data.
///
/// # Returns
///
/// - `200 OK` with the elevations
/// - `400 Bad Request` if a line is not two numbers
/// - `413 Payload Too Large` if the body exceeds 250 000 bytes or 10 000 points
#[utoipa::path(
    post,
    path = "/",
    tag = "elevation",
    request_body(
        content = String,
        description = "One `lat lon` pair per line",
        content_type = "text/plain"
    ),
    responses(
        (status = 200, description = "One elevation per line, NULL for no data", body = String, content_type = "text/plain"),
        (status = 400, description = "Invalid request format", body = String, content_type = "text/plain"),
        (status = 413, description = "Request too large or too many points", body = String, content_type = "text/plain")
    )
)]
pub async fn post_elevation(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            tracing::warn!("Request body over limit");
            return text_response(StatusCode::PAYLOAD_TOO_LARGE, "Request too large");
        }
        Err(rejection) => return text_response(rejection.status(), rejection.body_text()),
    };

    let Ok(text) = std::str::from_utf8(&body) else {
        return text_response(StatusCode::BAD_REQUEST, "Invalid request format");
    };

    let points = match parse_points(text, MAX_INPUT_POINTS) {
        Ok(points) => points,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected request");
            return match e {
                ProtocolError::InvalidLine { .. } => {
                    text_response(StatusCode::BAD_REQUEST, "Invalid request format")
                }
                ProtocolError::TooManyPoints { .. } => {
                    text_response(StatusCode::PAYLOAD_TOO_LARGE, "Too many points")
                }
            };
        }
    };

    tracing::debug!(points = points.len(), "Batch elevation query");

    // Each request is its own query session with its own cache
    let store = Arc::clone(&state.store);
    let cache_size = state.cache_size;
    let result = tokio::task::spawn_blocking(move || {
        let mut engine = ElevationQueryEngine::with_store(store, cache_size);
        let elevations = engine.query_batch(&points);
        (elevations, engine.cache_stats())
    })
    .await;

    match result {
        Ok((elevations, stats)) => {
            tracing::info!(
                points = elevations.len(),
                missing = elevations.iter().filter(|e| e.is_none()).count(),
                tiles_loaded = stats.miss_count,
                "Elevations computed"
            );
            text_response(StatusCode::OK, format_elevations(&elevations))
        }
        Err(e) => {
            tracing::error!(error = %e, "Query task failed");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// Health check endpoint.
///
/// Returns service status and version.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialize() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("0.1.0"));
    }

    #[test]
    fn test_text_response_content_type() {
        let response = text_response(StatusCode::BAD_REQUEST, "Invalid request format");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }
}
