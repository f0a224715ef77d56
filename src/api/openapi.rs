//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the trackdl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the trackdl REST API
///
/// This struct is used to generate the OpenAPI 3.1 specification that
/// describes all available endpoints, request/response types, and API
/// behavior.
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "trackdl REST API",
        version = "0.2.0",
        description = "REST API for resolving music URLs, orchestrating batch downloads with live progress, and packaging results",
        contact(
            name = "trackdl",
            url = "https://github.com/trackdl/trackdl"
        ),
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8750", description = "Local development server")
    ),
    paths(
        // Resolution
        crate::api::routes::track_info,
        crate::api::routes::collection_info,

        // Downloads
        crate::api::routes::start_track,
        crate::api::routes::start_collection,
        crate::api::routes::list_downloads,
        crate::api::routes::get_download,
        crate::api::routes::cancel_download,
        crate::api::routes::delete_download,

        // Progress
        crate::api::routes::batch_event_stream,
        crate::api::routes::track_event_stream,

        // Files & archives
        crate::api::routes::list_download_files,
        crate::api::routes::create_archive,
        crate::api::routes::cleanup_download,
        crate::api::routes::fetch_file,

        // System
        crate::api::routes::list_qualities,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(
        schemas(
            crate::types::DownloadId,
            crate::types::Platform,
            crate::types::CollectionKind,
            crate::types::Quality,
            crate::types::AudioFormat,
            crate::types::DownloadOptions,
            crate::types::ItemSource,
            crate::types::ItemDescriptor,
            crate::types::ItemStatus,
            crate::types::BatchStatus,
            crate::types::ItemJob,
            crate::types::BatchJob,
            crate::types::TrackMetadata,
            crate::types::CollectionInfo,
            crate::types::ProducedFile,
            crate::downloader::StartedDownload,
            crate::archive::ArchiveInfo,
            crate::api::routes::UrlQuery,
            crate::api::routes::StartDownloadRequest,
            crate::api::routes::CleanupQuery,
            crate::api::routes::CleanupResponse,
            crate::api::routes::QualityInfo,
            crate::api::routes::BatchProgressEvent,
            crate::api::routes::TrackProgressEvent,
            crate::error::ApiError,
            crate::error::ErrorDetail,
        )
    ),
    tags(
        (name = "resolve", description = "URL resolution"),
        (name = "downloads", description = "Download orchestration"),
        (name = "progress", description = "Progress event streams"),
        (name = "files", description = "Produced files and archives"),
        (name = "system", description = "Health and metadata")
    )
)]
pub struct ApiDoc;
