//! File, archive, and cleanup endpoint tests.

use super::*;
use serde_json::json;
use tower::ServiceExt;

/// Start a three-item batch and wait for it to complete
async fn completed_batch(
    downloader: &MusicDownloader,
) -> crate::downloader::StartedDownload {
    let started = downloader
        .start_collection(
            "https://www.youtube.com/playlist?list=PLabc",
            Default::default(),
        )
        .await
        .unwrap();
    wait_terminal(downloader, &started.id).await;
    started
}

#[tokio::test]
async fn fetch_missing_file_is_404_not_a_generic_error() {
    let (app, _downloader, _temp) = create_test_app(vec![]);

    let response = app
        .oneshot(get("/files/Artist%20-%20Song%20%5B192kbps%5D.mp3"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "file_not_found");
}

#[tokio::test]
async fn fetch_rejects_traversal_names() {
    let (app, _downloader, _temp) = create_test_app(vec![]);

    let response = app
        .oneshot(get("/files/..%2F..%2Fetc%2Fpasswd"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn produced_file_is_served_with_audio_content_type() {
    let (app, downloader, _temp) = create_test_app(vec![MockBehavior::Succeed]);
    let started = completed_batch(&downloader).await;

    let batch = downloader.get_batch(&started.id).await.unwrap();
    let name = batch.items[0].file.clone().unwrap();

    let response = app
        .oneshot(get(&format!("/files/{}", urlencoding::encode(&name))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "audio/mpeg"
    );
    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(disposition.starts_with("attachment"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"mock audio");
}

#[tokio::test]
async fn list_files_for_a_completed_batch() {
    let (app, downloader, _temp) = create_test_app(vec![
        MockBehavior::Succeed,
        MockBehavior::Succeed,
        MockBehavior::Succeed,
    ]);
    let started = completed_batch(&downloader).await;

    let response = app
        .oneshot(get(&format!("/downloads/{}/files", started.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let files = body.as_array().unwrap();
    assert_eq!(files.len(), 3);
    assert!(files.iter().all(|f| f["size_bytes"].as_u64().unwrap() > 0));
}

#[tokio::test]
async fn archive_before_completion_is_409() {
    let (app, downloader, _temp) = create_test_app(vec![MockBehavior::Hang]);

    let started = downloader
        .start_collection(
            "https://www.youtube.com/playlist?list=PLabc",
            Default::default(),
        )
        .await
        .unwrap();

    let response = app
        .oneshot(post_json(
            &format!("/downloads/{}/archive", started.id),
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "batch_not_terminal");

    // Unblock and settle the hung batch
    downloader.cancel(&started.id).await.unwrap();
    wait_terminal(&downloader, &started.id).await;
}

#[tokio::test]
async fn archive_for_unknown_download_is_404() {
    let (app, _downloader, _temp) = create_test_app(vec![]);

    let response = app
        .oneshot(post_json("/downloads/missing/archive", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn archive_then_cleanup_lifecycle() {
    let (app, downloader, temp) = create_test_app(vec![
        MockBehavior::Succeed,
        MockBehavior::Succeed,
        MockBehavior::Succeed,
    ]);
    let started = completed_batch(&downloader).await;

    // Assemble the archive
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/downloads/{}/archive", started.id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let archive = body["file"].as_str().unwrap().to_string();
    assert!(archive.ends_with(".zip"));
    assert!(body["size_bytes"].as_u64().unwrap() > 0);

    // Idempotent: a second call returns the identical reference
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/downloads/{}/archive", started.id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["file"], archive.as_str());

    // Cleanup keeps the archive by default
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/downloads/{}/cleanup", started.id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["deleted_files"], 3);
    assert!(temp.path().join(&archive).is_file());

    // Cleanup twice in a row never errors
    let response = app
        .oneshot(post_json(
            &format!("/downloads/{}/cleanup?keep_archive=false", started.id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);
    assert!(!temp.path().join(&archive).exists());
}

#[tokio::test]
async fn cleanup_of_unknown_download_still_reports_success() {
    let (app, _downloader, _temp) = create_test_app(vec![]);

    let response = app
        .oneshot(post_json("/downloads/missing/cleanup", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);
}
