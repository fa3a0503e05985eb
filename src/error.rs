//! Error taxonomy shared by every pipeline stage

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error types for pipeline operations
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported style: {0}")]
    UnsupportedStyle(String),

    #[error("No frames to assemble: {0}")]
    NoFrames(String),

    #[error("Video not readable: {0}")]
    NotReadable(String),

    #[error("Image not readable: {0}")]
    UnreadableImage(String),

    #[error("Frame size mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl PipelineError {
    /// Stable machine-readable kind reported to API clients
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NotFound(_) => "not_found",
            PipelineError::UnsupportedStyle(_) => "unsupported_style",
            PipelineError::NoFrames(_) => "no_frames",
            PipelineError::NotReadable(_) => "not_readable",
            PipelineError::UnreadableImage(_) => "unreadable_image",
            PipelineError::DimensionMismatch(_) => "dimension_mismatch",
            PipelineError::InvalidInput(_) => "invalid_input",
            PipelineError::Internal(_) => "internal_error",
            PipelineError::Io(_) => "io_error",
            PipelineError::Image(_) => "image_error",
        }
    }

    /// Wrap a lower-level failure, keeping its message as the cause text
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        PipelineError::Internal(cause.to_string())
    }

    /// Prefix the message with `context`, keeping the kind
    ///
    /// Wrapped io and image errors become `Internal` since their sources
    /// cannot carry extra text.
    pub fn with_context(self, context: impl std::fmt::Display) -> Self {
        match self {
            PipelineError::NotFound(m) => PipelineError::NotFound(format!("{context}: {m}")),
            PipelineError::UnsupportedStyle(m) => PipelineError::UnsupportedStyle(format!("{context}: {m}")),
            PipelineError::NoFrames(m) => PipelineError::NoFrames(format!("{context}: {m}")),
            PipelineError::NotReadable(m) => PipelineError::NotReadable(format!("{context}: {m}")),
            PipelineError::UnreadableImage(m) => PipelineError::UnreadableImage(format!("{context}: {m}")),
            PipelineError::DimensionMismatch(m) => PipelineError::DimensionMismatch(format!("{context}: {m}")),
            PipelineError::InvalidInput(m) => PipelineError::InvalidInput(format!("{context}: {m}")),
            PipelineError::Internal(m) => PipelineError::Internal(format!("{context}: {m}")),
            PipelineError::Io(e) => PipelineError::Internal(format!("{context}: {e}")),
            PipelineError::Image(e) => PipelineError::Internal(format!("{context}: {e}")),
        }
    }
}
