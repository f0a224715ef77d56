//! Resolution handlers: track metadata and collection listings.

use super::{UrlQuery, require_url};
use crate::api::AppState;
use crate::error::Result;
use axum::{
    Json,
    extract::{Query, State},
};

/// GET /tracks/info - Resolve a single track's metadata
#[utoipa::path(
    get,
    path = "/tracks/info",
    tag = "resolve",
    params(
        ("url" = String, Query, description = "Track URL to resolve")
    ),
    responses(
        (status = 200, description = "Track metadata", body = crate::types::TrackMetadata),
        (status = 400, description = "Unsupported or invalid URL"),
        (status = 502, description = "Platform lookup failed")
    )
)]
pub async fn track_info(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<crate::types::TrackMetadata>> {
    require_url(&query.url)?;
    let metadata = state.downloader.resolve_track(&query.url).await?;
    Ok(Json(metadata))
}

/// GET /collections/info - Resolve an album/playlist listing
#[utoipa::path(
    get,
    path = "/collections/info",
    tag = "resolve",
    params(
        ("url" = String, Query, description = "Collection URL to resolve")
    ),
    responses(
        (status = 200, description = "Collection listing (items capped at the batch maximum, `limited` set when truncated)", body = crate::types::CollectionInfo),
        (status = 400, description = "Unsupported or invalid URL"),
        (status = 502, description = "Platform listing fetch failed")
    )
)]
pub async fn collection_info(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<crate::types::CollectionInfo>> {
    require_url(&query.url)?;
    let info = state.downloader.resolve_collection(&query.url).await?;
    Ok(Json(info))
}
