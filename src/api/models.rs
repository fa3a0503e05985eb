//! API data models

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, warn};

use crate::error::PipelineError;
use crate::pipeline::VideoId;
use crate::state::NamespaceStatus;

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    pub video_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StyleQuery {
    pub video_id: String,
    pub style: String,
}

#[derive(Debug, Deserialize)]
pub struct StyleFrameQuery {
    pub video_id: String,
    pub frame_name: String,
    pub style: String,
}

#[derive(Debug, Deserialize)]
pub struct FullPipelineQuery {
    pub style: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    pub codec_available: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub video_id: VideoId,
    pub saved_as: String,
    pub original_filename: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub message: String,
    pub video_id: VideoId,
    pub frame_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StyleFrameResponse {
    pub message: String,
    pub styled_frame: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StyleFramesResponse {
    pub message: String,
    pub style: String,
    pub processed: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssembleResponse {
    pub message: String,
    pub video_path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub removed: Vec<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteAllResponse {
    pub message: String,
    pub removed_entries: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadsResponse {
    pub uploads: Vec<String>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: NamespaceStatus,
    pub status_text: Option<String>,
    pub progress: u8,
}

impl From<NamespaceStatus> for StatusResponse {
    fn from(status: NamespaceStatus) -> Self {
        let status_text = status.stage.map(|s| s.status_string().to_string());
        let progress = status.stage.map(|s| s.progress_percentage()).unwrap_or(0);
        Self {
            status,
            status_text,
            progress,
        }
    }
}

/// Body of every failed request
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

/// Transport-side failure: a pipeline error or a malformed request
#[derive(Debug)]
pub enum ApiError {
    Pipeline(PipelineError),
    BadRequest(String),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Pipeline(PipelineError::internal(e))
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

/// HTTP status for a pipeline error kind
pub fn status_for(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::NotFound(_) | PipelineError::NoFrames(_) => StatusCode::NOT_FOUND,
        PipelineError::UnsupportedStyle(_) | PipelineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PipelineError::NotReadable(_) | PipelineError::UnreadableImage(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::DimensionMismatch(_)
        | PipelineError::Internal(_)
        | PipelineError::Io(_)
        | PipelineError::Image(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Pipeline(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    error!("❌ Request failed: {}", e);
                } else {
                    warn!("Request rejected: {}", e);
                }
                (
                    status,
                    ErrorBody {
                        error: e.kind().to_string(),
                        detail: e.to_string(),
                    },
                )
            }
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "invalid_input".to_string(),
                    detail,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
