//! Video identifiers and the storage path scheme derived from them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{PipelineError, Result};
use crate::style::Style;

/// Extension of raw uploads and assembled videos
pub const VIDEO_EXTENSION: &str = "mp4";

/// Opaque token naming one upload's artifact family
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

impl VideoId {
    /// Mint a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept only canonical UUIDs so an id can never escape its storage root
    pub fn parse(raw: &str) -> Result<Self> {
        let uuid = Uuid::parse_str(raw)
            .map_err(|_| PipelineError::InvalidInput(format!("invalid video id: {raw}")))?;
        Ok(Self(uuid.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VideoId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VideoId {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<VideoId> for String {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

/// The four storage roots every namespace is spread across
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub uploads: PathBuf,
    pub frames: PathBuf,
    pub styled_frames: PathBuf,
    pub styled_videos: PathBuf,
}

impl StorageLayout {
    pub fn from_config(storage: &StorageConfig) -> Self {
        Self {
            uploads: storage.uploads_root(),
            frames: storage.frames_root(),
            styled_frames: storage.styled_frames_root(),
            styled_videos: storage.styled_videos_root(),
        }
    }

    pub fn roots(&self) -> [&Path; 4] {
        [
            &self.uploads,
            &self.frames,
            &self.styled_frames,
            &self.styled_videos,
        ]
    }

    pub fn namespace(&self, id: &VideoId) -> ArtifactNamespace {
        ArtifactNamespace {
            id: id.clone(),
            layout: self.clone(),
        }
    }
}

/// Every storage location addressable under one [`VideoId`]
///
/// ```text
/// uploads/{id}.mp4
/// frames/{id}/frame_NNNNN.jpg
/// styled_frames/{id}/{style}/frame_NNNNN.jpg
/// styled_videos/{id}/{style}.mp4
/// ```
#[derive(Debug, Clone)]
pub struct ArtifactNamespace {
    id: VideoId,
    layout: StorageLayout,
}

impl ArtifactNamespace {
    pub fn id(&self) -> &VideoId {
        &self.id
    }

    pub fn raw_video(&self) -> PathBuf {
        self.layout
            .uploads
            .join(format!("{}.{}", self.id, VIDEO_EXTENSION))
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.layout.frames.join(self.id.as_str())
    }

    pub fn frame_path(&self, frame_name: &str) -> PathBuf {
        self.frames_dir().join(frame_name)
    }

    /// Parent of every per-style styled-frames directory
    pub fn styled_frames_base(&self) -> PathBuf {
        self.layout.styled_frames.join(self.id.as_str())
    }

    pub fn styled_frames_dir(&self, style: Style) -> PathBuf {
        self.styled_frames_base().join(style.name())
    }

    pub fn styled_frame_path(&self, style: Style, frame_name: &str) -> PathBuf {
        self.styled_frames_dir(style).join(frame_name)
    }

    /// Parent of every assembled video for this id
    pub fn styled_videos_dir(&self) -> PathBuf {
        self.layout.styled_videos.join(self.id.as_str())
    }

    pub fn styled_video(&self, style: Style) -> PathBuf {
        self.styled_videos_dir()
            .join(format!("{}.{}", style.name(), VIDEO_EXTENSION))
    }
}
