//! API request handlers
//!
//! Every pipeline stage is blocking file and codec work, so each handler
//! moves it onto the blocking pool before calling into the pipeline.

use axum::body::Bytes;
use axum::extract::Multipart;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::models::*;
use crate::pipeline::{ArtifactPipeline, PipelineRun, VideoId};

/// Multipart field carrying the uploaded video
pub const VIDEO_FIELD: &str = "video";

/// Handle health check requests
pub async fn health_check(pipeline: Arc<ArtifactPipeline>) -> HealthResponse {
    let codec_available = tokio::task::spawn_blocking(move || pipeline.codec().is_available())
        .await
        .unwrap_or(false);

    HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        codec_available,
    }
}

/// Pull the `video` field out of a multipart body
pub async fn read_video_field(mut multipart: Multipart) -> ApiResult<(Bytes, Option<String>)> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(VIDEO_FIELD) {
            let original_filename = field.file_name().map(str::to_string);
            let data = field.bytes().await?;
            return Ok((data, original_filename));
        }
    }
    Err(ApiError::BadRequest(format!("missing multipart field '{}'", VIDEO_FIELD)))
}

pub async fn upload_video(
    pipeline: Arc<ArtifactPipeline>,
    data: Bytes,
    original_filename: Option<String>,
) -> ApiResult<UploadResponse> {
    let id = tokio::task::spawn_blocking(move || pipeline.upload(&data)).await??;
    let saved_as = format!("{}.{}", id, crate::pipeline::namespace::VIDEO_EXTENSION);

    info!("📥 Upload {} stored as {}", original_filename.as_deref().unwrap_or("<unnamed>"), saved_as);
    Ok(UploadResponse {
        message: "Video uploaded successfully".to_string(),
        video_id: id,
        saved_as,
        original_filename,
    })
}

pub async fn extract_frames(pipeline: Arc<ArtifactPipeline>, video_id: &str) -> ApiResult<ExtractResponse> {
    let id = VideoId::parse(video_id)?;
    let frame_count = {
        let id = id.clone();
        tokio::task::spawn_blocking(move || pipeline.extract(&id)).await??
    };

    Ok(ExtractResponse {
        message: format!("{} frames extracted", frame_count),
        video_id: id,
        frame_count,
    })
}

pub async fn style_frame(pipeline: Arc<ArtifactPipeline>, query: StyleFrameQuery) -> ApiResult<StyleFrameResponse> {
    let id = VideoId::parse(&query.video_id)?;
    let StyleFrameQuery { frame_name, style, .. } = query;

    let message = format!("{} styled with {}", frame_name, style);
    let styled_frame =
        tokio::task::spawn_blocking(move || pipeline.style_one(&id, &style, &frame_name)).await??;

    Ok(StyleFrameResponse { message, styled_frame })
}

pub async fn style_frames(pipeline: Arc<ArtifactPipeline>, query: StyleQuery) -> ApiResult<StyleFramesResponse> {
    let id = VideoId::parse(&query.video_id)?;
    let style = query.style;

    let processed = {
        let style = style.clone();
        tokio::task::spawn_blocking(move || pipeline.style_all(&id, &style)).await??
    };

    Ok(StyleFramesResponse {
        message: format!("{} frames styled", processed.len()),
        style,
        processed,
    })
}

pub async fn create_stylized_video(pipeline: Arc<ArtifactPipeline>, query: StyleQuery) -> ApiResult<AssembleResponse> {
    let id = VideoId::parse(&query.video_id)?;
    let style = query.style;

    let video_path = tokio::task::spawn_blocking(move || pipeline.assemble(&id, &style)).await??;

    Ok(AssembleResponse {
        message: "Stylized video created".to_string(),
        video_path,
    })
}

/// Resolve and read an assembled video
pub async fn download_video(pipeline: Arc<ArtifactPipeline>, video_id: &str, style: String) -> ApiResult<Vec<u8>> {
    let id = VideoId::parse(video_id)?;
    let path = tokio::task::spawn_blocking(move || pipeline.styled_video_path(&id, &style)).await??;
    read_artifact(path).await
}

/// Resolve and read a styled frame
pub async fn download_frame(
    pipeline: Arc<ArtifactPipeline>,
    video_id: &str,
    style: String,
    frame_name: String,
) -> ApiResult<Vec<u8>> {
    let id = VideoId::parse(video_id)?;
    let path = tokio::task::spawn_blocking(move || pipeline.styled_frame_path(&id, &style, &frame_name)).await??;
    read_artifact(path).await
}

pub async fn video_status(pipeline: Arc<ArtifactPipeline>, video_id: &str) -> ApiResult<StatusResponse> {
    let id = VideoId::parse(video_id)?;
    let status = tokio::task::spawn_blocking(move || pipeline.status(&id)).await??;
    Ok(status.into())
}

pub async fn delete_video(pipeline: Arc<ArtifactPipeline>, video_id: &str) -> ApiResult<DeleteResponse> {
    let id = VideoId::parse(video_id)?;
    let message = format!("Deleted all artifacts of {}", id);
    let removed = tokio::task::spawn_blocking(move || pipeline.delete(&id)).await??;
    Ok(DeleteResponse { message, removed })
}

pub async fn delete_all(pipeline: Arc<ArtifactPipeline>) -> ApiResult<DeleteAllResponse> {
    let removed_entries = tokio::task::spawn_blocking(move || pipeline.delete_all()).await??;
    Ok(DeleteAllResponse {
        message: "All artifacts deleted".to_string(),
        removed_entries,
    })
}

pub async fn list_uploads(pipeline: Arc<ArtifactPipeline>) -> ApiResult<UploadsResponse> {
    let uploads = tokio::task::spawn_blocking(move || pipeline.list_uploads()).await??;
    Ok(UploadsResponse {
        total: uploads.len(),
        uploads,
    })
}

/// Run every stage and hand back the finished video
pub async fn full_pipeline(pipeline: Arc<ArtifactPipeline>, data: Bytes, style: String) -> ApiResult<(PipelineRun, Vec<u8>)> {
    let run = tokio::task::spawn_blocking(move || pipeline.full_pipeline(&data, &style)).await??;
    let video = read_artifact(run.video_path.clone()).await?;
    Ok((run, video))
}

async fn read_artifact(path: PathBuf) -> ApiResult<Vec<u8>> {
    tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::Pipeline(e.into()))
}
