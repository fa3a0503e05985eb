/// Cartoonizer - video stylization service
///
/// Uploads a video, splits it into frames, applies a per-frame style
/// (cel-shaded cartoon or grayscale) and reassembles the styled frames into
/// a new video. Every artifact lives under a per-upload namespace on disk.

pub mod api;
pub mod config;
pub mod error;
pub mod frames;
pub mod pipeline;
pub mod state;
pub mod style;
pub mod video;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{PipelineError, Result};
pub use crate::frames::FrameRef;
pub use crate::pipeline::{ArtifactNamespace, ArtifactPipeline, PipelineRun, VideoId};
pub use crate::state::{NamespaceStatus, PipelineStage};
pub use crate::style::{CartoonFilter, CartoonParams, Style};
pub use crate::video::{FrameCodec, VideoInfo};
