use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use cartoonizer::api::{build_router, AppState};
use cartoonizer::frames::{self, FrameRef};
use cartoonizer::ConfigBuilder;
use image::{Rgb, RgbImage};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "cartoonizer-test-boundary";

fn app(temp_dir: &TempDir) -> (Router, AppState) {
    let config = ConfigBuilder::new()
        .with_data_root(temp_dir.path().join("data"))
        .build();
    let state = AppState::new(config);
    state.pipeline.init_storage().unwrap();
    (build_router(state.clone()), state)
}

fn multipart_body(field: &str, file_name: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: video/mp4\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(uri: &str, field: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(multipart_body(field, "clip.mp4", data)))
        .unwrap()
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, req).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health() {
    let temp_dir = TempDir::new().unwrap();
    let (app, _) = app(&temp_dir);

    let (status, json) = send_json(&app, request("GET", "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "cartoonizer");
}

#[tokio::test]
async fn test_upload_then_list_and_delete() {
    let temp_dir = TempDir::new().unwrap();
    let (app, _) = app(&temp_dir);

    let (status, json) = send_json(&app, upload_request("/upload_video", "video", b"not really mp4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["original_filename"], "clip.mp4");
    let video_id = json["video_id"].as_str().unwrap().to_string();
    assert_eq!(json["saved_as"], format!("{}.mp4", video_id));

    let (status, json) = send_json(&app, request("GET", "/uploads")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);

    let (status, json) = send_json(&app, request("GET", &format!("/videos/{}/status", video_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stage"], "Uploaded");

    let (status, _) = send_json(&app, request("DELETE", &format!("/delete/{}", video_id))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send_json(&app, request("DELETE", &format!("/delete/{}", video_id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_upload_without_video_field_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let (app, state) = app(&temp_dir);

    let (status, json) = send_json(&app, upload_request("/upload_video", "file", b"bytes")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_input");
    assert!(state.pipeline.list_uploads().unwrap().is_empty());
}

#[tokio::test]
async fn test_error_kinds_map_to_status() {
    let temp_dir = TempDir::new().unwrap();
    let (app, _) = app(&temp_dir);
    let unknown = uuid::Uuid::new_v4();

    let (status, json) = send_json(&app, request("POST", &format!("/extract_frames?video_id={}", unknown))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");

    let (status, json) = send_json(
        &app,
        request("POST", &format!("/style_frames?video_id={}&style=bogus", unknown)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "unsupported_style");
    assert!(json["detail"].as_str().unwrap().contains("bogus"));

    let (status, json) = send_json(&app, request("POST", "/extract_frames?video_id=../../etc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_input");

    let (status, json) = send_json(&app, request("GET", &format!("/download_video/{}/cartoon", unknown))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_style_frame_and_download() {
    let temp_dir = TempDir::new().unwrap();
    let (app, state) = app(&temp_dir);

    let id = state.pipeline.upload(b"placeholder").unwrap();
    let namespace = state.pipeline.namespace(&id);
    frames::save_frame(
        &RgbImage::from_pixel(20, 10, Rgb([200, 40, 40])),
        &namespace.frame_path("frame_00000.jpg"),
        90,
    )
    .unwrap();

    let (status, json) = send_json(
        &app,
        request(
            "POST",
            &format!("/style_frame?video_id={}&frame_name=frame_00000.jpg&style=grayscale", id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", json);

    let (status, body) = send(&app, request("GET", &format!("/download_frame/{}/grayscale/frame_00000.jpg", id))).await;
    assert_eq!(status, StatusCode::OK);
    let styled = image::load_from_memory(&body).unwrap().to_rgb8();
    assert_eq!(styled.dimensions(), (20, 10));

    let (status, json) = send_json(
        &app,
        request("POST", &format!("/create_stylized_video?video_id={}&style=cartoon", id)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_delete_all() {
    let temp_dir = TempDir::new().unwrap();
    let (app, state) = app(&temp_dir);
    state.pipeline.upload(b"one").unwrap();
    state.pipeline.upload(b"two").unwrap();

    let (status, json) = send_json(&app, request("DELETE", "/delete_all")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed_entries"], 2);
    assert!(state.pipeline.list_uploads().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_full_pipeline_reports_video_id() {
    let temp_dir = TempDir::new().unwrap();
    let (app, state) = app(&temp_dir);

    let (status, json) = send_json(
        &app,
        upload_request("/full_pipeline?style=cartoon", "video", b"not a video container"),
    )
    .await;
    assert!(status.is_client_error() || status.is_server_error());

    let uploads = state.pipeline.list_uploads().unwrap();
    assert_eq!(uploads.len(), 1);
    let video_id = uploads[0].trim_end_matches(".mp4");
    assert!(json["detail"].as_str().unwrap().contains(video_id), "{}", json);

    let (status, _) = send_json(&app, request("GET", &format!("/videos/{}/status", video_id))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_full_pipeline_returns_video() {
    let temp_dir = TempDir::new().unwrap();
    let (app, state) = app(&temp_dir);
    if !state.pipeline.codec().is_available() {
        eprintln!("ffmpeg not on PATH, skipping");
        return;
    }

    let source_dir = temp_dir.path().join("source");
    let sequence: Vec<FrameRef> = (0..4)
        .map(|i| {
            let path = source_dir.join(frames::frame_file_name(i));
            frames::save_frame(&RgbImage::from_pixel(64, 48, Rgb([(i * 50) as u8, 100, 150])), &path, 90).unwrap();
            FrameRef::new(path)
        })
        .collect();
    let sample = state
        .pipeline
        .codec()
        .encode_frames(&sequence, 24, &temp_dir.path().join("sample.mp4"))
        .unwrap();

    let data = std::fs::read(&sample).unwrap();
    let response = app
        .clone()
        .oneshot(upload_request("/full_pipeline?style=grayscale", "video", &data))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "video/mp4");
    assert!(response.headers().contains_key("x-video-id"));

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(!body.is_empty());
}
