//! HTTP server implementation for the API

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use super::handlers;
use super::models::*;
use crate::config::Config;
use crate::pipeline::ArtifactPipeline;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ArtifactPipeline>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let pipeline = ArtifactPipeline::new(&config);
        Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
        }
    }
}

/// Build the router with every route, the body limit and the middleware stack
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/health", get(health_handler))
        .route("/upload_video", post(upload_video_handler))
        .route("/extract_frames", post(extract_frames_handler))
        .route("/style_frame", post(style_frame_handler))
        .route("/style_frames", post(style_frames_handler))
        .route("/create_stylized_video", post(create_stylized_video_handler))
        .route("/download_video/:video_id/:style", get(download_video_handler))
        .route("/download_frame/:video_id/:style/:frame_name", get(download_frame_handler))
        .route("/videos/:video_id/status", get(video_status_handler))
        .route("/delete/:video_id", delete(delete_video_handler))
        .route("/delete_all", delete(delete_all_handler))
        .route("/uploads", get(list_uploads_handler))
        .route("/full_pipeline", post(full_pipeline_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}

/// Configure and start the HTTP server
pub async fn start_http_server(config: Config) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config);
    state.pipeline.init_storage()?;

    if !state.pipeline.codec().is_available() {
        tracing::warn!("⚠️ ffmpeg not found; extraction and assembly will fail");
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🌐 API server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(handlers::health_check(state.pipeline).await)
}

async fn upload_video_handler(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<UploadResponse>> {
    let (data, original_filename) = handlers::read_video_field(multipart).await?;
    Ok(Json(handlers::upload_video(state.pipeline, data, original_filename).await?))
}

async fn extract_frames_handler(
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>,
) -> ApiResult<Json<ExtractResponse>> {
    Ok(Json(handlers::extract_frames(state.pipeline, &query.video_id).await?))
}

async fn style_frame_handler(
    State(state): State<AppState>,
    Query(query): Query<StyleFrameQuery>,
) -> ApiResult<Json<StyleFrameResponse>> {
    Ok(Json(handlers::style_frame(state.pipeline, query).await?))
}

async fn style_frames_handler(
    State(state): State<AppState>,
    Query(query): Query<StyleQuery>,
) -> ApiResult<Json<StyleFramesResponse>> {
    Ok(Json(handlers::style_frames(state.pipeline, query).await?))
}

async fn create_stylized_video_handler(
    State(state): State<AppState>,
    Query(query): Query<StyleQuery>,
) -> ApiResult<Json<AssembleResponse>> {
    Ok(Json(handlers::create_stylized_video(state.pipeline, query).await?))
}

async fn download_video_handler(
    State(state): State<AppState>,
    Path((video_id, style)): Path<(String, String)>,
) -> ApiResult<Response> {
    let file_name = format!("{}_{}.mp4", video_id, style);
    let bytes = handlers::download_video(state.pipeline, &video_id, style).await?;
    Ok(attachment("video/mp4", &file_name, bytes))
}

async fn download_frame_handler(
    State(state): State<AppState>,
    Path((video_id, style, frame_name)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let bytes = handlers::download_frame(state.pipeline, &video_id, style, frame_name).await?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}

async fn video_status_handler(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    Ok(Json(handlers::video_status(state.pipeline, &video_id).await?))
}

async fn delete_video_handler(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    Ok(Json(handlers::delete_video(state.pipeline, &video_id).await?))
}

async fn delete_all_handler(State(state): State<AppState>) -> ApiResult<Json<DeleteAllResponse>> {
    Ok(Json(handlers::delete_all(state.pipeline).await?))
}

async fn list_uploads_handler(State(state): State<AppState>) -> ApiResult<Json<UploadsResponse>> {
    Ok(Json(handlers::list_uploads(state.pipeline).await?))
}

async fn full_pipeline_handler(
    State(state): State<AppState>,
    Query(query): Query<FullPipelineQuery>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let (data, _) = handlers::read_video_field(multipart).await?;
    let (run, bytes) = handlers::full_pipeline(state.pipeline, data, query.style).await?;

    let file_name = format!("{}_{}.mp4", run.video_id, run.video_path.file_stem().and_then(|s| s.to_str()).unwrap_or("styled"));
    let mut response = attachment("video/mp4", &file_name, bytes);
    if let Ok(value) = run.video_id.as_str().parse() {
        response.headers_mut().insert("x-video-id", value);
    }
    Ok(response)
}

fn attachment(content_type: &'static str, file_name: &str, bytes: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", file_name);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}
