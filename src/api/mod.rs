//! REST API server module
//!
//! Provides an OpenAPI 3.1 compliant REST API over a
//! [`MusicDownloader`](crate::MusicDownloader): resolving URLs, starting
//! downloads, streaming progress via Server-Sent Events, serving produced
//! files, and managing archives.

use crate::{Config, MusicDownloader, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Resolution
/// - `GET /tracks/info?url=` - Resolve a single track's metadata
/// - `GET /collections/info?url=` - Resolve an album/playlist listing
///
/// ## Downloads
/// - `POST /downloads/track` - Start a single-track download
/// - `POST /downloads/collection` - Start an album/playlist batch
/// - `GET /downloads` - List all tracked downloads
/// - `GET /downloads/:id` - Get one download's snapshot
/// - `POST /downloads/:id/cancel` - Cooperatively cancel
/// - `DELETE /downloads/:id` - Evict tracking state
///
/// ## Progress
/// - `GET /downloads/:id/events` - SSE batch progress stream
/// - `GET /downloads/:id/events/track` - SSE condensed single-track stream
///
/// ## Files & Archives
/// - `GET /downloads/:id/files` - List produced files
/// - `POST /downloads/:id/archive` - Assemble the batch archive
/// - `POST /downloads/:id/cleanup` - Delete intermediate files
/// - `GET /files/:name` - Fetch one produced file
///
/// ## System
/// - `GET /qualities` - Supported audio qualities
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive documentation (if enabled)
pub fn create_router(downloader: Arc<MusicDownloader>, config: Arc<Config>) -> Router {
    let state = AppState::new(downloader, config.clone());

    let router = Router::new()
        // Resolution
        .route("/tracks/info", get(routes::track_info))
        .route("/collections/info", get(routes::collection_info))
        // Downloads
        .route("/downloads/track", post(routes::start_track))
        .route("/downloads/collection", post(routes::start_collection))
        .route("/downloads", get(routes::list_downloads))
        .route("/downloads/:id", get(routes::get_download))
        .route("/downloads/:id", delete(routes::delete_download))
        .route("/downloads/:id/cancel", post(routes::cancel_download))
        // Progress
        .route("/downloads/:id/events", get(routes::batch_event_stream))
        .route(
            "/downloads/:id/events/track",
            get(routes::track_event_stream),
        )
        // Files & archives
        .route("/downloads/:id/files", get(routes::list_download_files))
        .route("/downloads/:id/archive", post(routes::create_archive))
        .route("/downloads/:id/cleanup", post(routes::cleanup_download))
        .route("/files/:name", get(routes::fetch_file))
        // System
        .route("/qualities", get(routes::list_qualities))
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    // Merge Swagger UI routes if enabled in config (before applying state)
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state);

    // Apply CORS middleware if enabled in config
    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// Supports "*" for any origin; otherwise only the listed origins are
/// allowed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Creates a TCP listener, binds it to the configured address, and serves
/// the API router until the server is shut down.
///
/// # Example
///
/// ```no_run
/// use trackdl::{Config, MusicDownloader};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let downloader = Arc::new(MusicDownloader::new((*config).clone())?);
///
/// // Start API server (blocks until shutdown)
/// trackdl::api::start_api_server(downloader, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(
    downloader: Arc<MusicDownloader>,
    config: Arc<Config>,
) -> Result<()> {
    let bind_address = config.server.api.bind_address;

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    let app = create_router(downloader, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %bind_address,
        "API server listening"
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServer(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
