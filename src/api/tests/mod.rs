use super::*;
use crate::test_helpers::{MockBehavior, create_test_downloader};
use crate::types::{BatchStatus, DownloadId};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

mod files;

/// Router + downloader over a temp dir and scripted extraction
fn create_test_app(
    behaviors: Vec<MockBehavior>,
) -> (axum::Router, Arc<MusicDownloader>, tempfile::TempDir) {
    let (downloader, temp) = create_test_downloader(behaviors);
    let downloader = Arc::new(downloader);
    let config = downloader.config();
    let app = create_router(downloader.clone(), config);
    (app, downloader, temp)
}

/// Poll until the download reaches a terminal status (or panic after 5s)
async fn wait_terminal(downloader: &MusicDownloader, id: &DownloadId) {
    for _ in 0..500 {
        let batch = downloader.get_batch(id).await.unwrap();
        if batch.is_terminal() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("download {id} never reached a terminal state");
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _downloader, _temp) = create_test_app(vec![]);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_qualities_endpoint_lists_the_fixed_set() {
    let (app, _downloader, _temp) = create_test_app(vec![]);

    let response = app.oneshot(get("/qualities")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["default_quality"], "192");
    let qualities = body["available_qualities"].as_array().unwrap();
    assert_eq!(qualities.len(), 4);
    assert!(qualities.iter().any(|q| q["quality"] == "320"));
}

#[tokio::test]
async fn test_cors_enabled() {
    let (app, _downloader, _temp) = create_test_app(vec![]);

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_openapi_spec_is_served() {
    let (app, _downloader, _temp) = create_test_app(vec![]);

    let response = app.oneshot(get("/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["paths"]["/downloads/collection"].is_object());
    assert!(body["paths"]["/downloads/{id}/events"].is_object());
}

#[tokio::test]
async fn test_api_server_spawns() {
    let (downloader, _temp) = create_test_downloader(vec![]);
    let mut config = (*downloader.config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap(); // OS assigns a free port

    let downloader = Arc::new(
        MusicDownloader::with_extractor(
            config.clone(),
            Arc::new(crate::test_helpers::MockExtractor::with_behaviors(vec![])),
        )
        .unwrap(),
    );

    let api_handle = tokio::spawn({
        let downloader = downloader.clone();
        let config = Arc::new(config);
        async move { start_api_server(downloader, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    api_handle.abort();
}
