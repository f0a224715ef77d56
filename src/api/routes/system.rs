//! System handlers: health, qualities, OpenAPI.

use super::QualityInfo;
use crate::types::Quality;
use axum::{Json, response::IntoResponse};
use serde_json::json;

/// GET /health - Health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy")
    )
)]
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /qualities - Supported audio qualities
#[utoipa::path(
    get,
    path = "/qualities",
    tag = "system",
    responses(
        (status = 200, description = "Supported qualities with bitrates and descriptions", body = Vec<QualityInfo>)
    )
)]
pub async fn list_qualities() -> Json<serde_json::Value> {
    let qualities: Vec<QualityInfo> = Quality::all()
        .into_iter()
        .map(|q| QualityInfo {
            quality: q.to_string(),
            bitrate: q.bitrate_arg(),
            description: q.description().to_string(),
        })
        .collect();

    Json(json!({
        "available_qualities": qualities,
        "default_quality": Quality::default().to_string(),
    }))
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI 3.1 specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}
