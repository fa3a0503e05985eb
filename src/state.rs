use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frames;
use crate::pipeline::{ArtifactNamespace, VideoId};
use crate::style::Style;

/// Stages a video id moves through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PipelineStage {
    /// Raw video stored
    Uploaded,

    /// Frames extracted from the raw video
    FramesExtracted,

    /// At least one style has styled frames
    Styled,

    /// At least one styled video has been assembled
    VideoAssembled,
}

impl PipelineStage {
    /// Get progress percentage for this stage
    pub fn progress_percentage(&self) -> u8 {
        match self {
            PipelineStage::Uploaded => 10,
            PipelineStage::FramesExtracted => 40,
            PipelineStage::Styled => 80,
            PipelineStage::VideoAssembled => 100,
        }
    }

    /// Get human-readable status string
    pub fn status_string(&self) -> &'static str {
        match self {
            PipelineStage::Uploaded => "Uploaded",
            PipelineStage::FramesExtracted => "Frames Extracted",
            PipelineStage::Styled => "Styled",
            PipelineStage::VideoAssembled => "Video Assembled",
        }
    }
}

/// Per-style artifacts present for one id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleStatus {
    pub style: Style,
    pub styled_frames: usize,
    pub video_assembled: bool,
}

/// Snapshot of what exists on disk for one id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceStatus {
    pub video_id: VideoId,
    pub stage: Option<PipelineStage>,
    pub uploaded: bool,
    pub frame_count: usize,
    pub styles: Vec<StyleStatus>,
}

impl NamespaceStatus {
    /// Inspect the artifacts of a namespace
    ///
    /// The stage is the furthest one with artifacts present; `None` means
    /// nothing at all exists for the id.
    pub fn detect(namespace: &ArtifactNamespace) -> Result<Self> {
        let uploaded = namespace.raw_video().is_file();
        let frame_count = frames::list_frames(&namespace.frames_dir())?.len();

        let mut styles = Vec::new();
        for style in Style::ALL {
            let styled_frames = frames::list_frames(&namespace.styled_frames_dir(style))?.len();
            let video_assembled = namespace.styled_video(style).is_file();
            if styled_frames > 0 || video_assembled {
                styles.push(StyleStatus {
                    style,
                    styled_frames,
                    video_assembled,
                });
            }
        }

        let stage = if styles.iter().any(|s| s.video_assembled) {
            Some(PipelineStage::VideoAssembled)
        } else if !styles.is_empty() {
            Some(PipelineStage::Styled)
        } else if frame_count > 0 {
            Some(PipelineStage::FramesExtracted)
        } else if uploaded {
            Some(PipelineStage::Uploaded)
        } else {
            None
        };

        Ok(Self {
            video_id: namespace.id().clone(),
            stage,
            uploaded,
            frame_count,
            styles,
        })
    }

    pub fn exists(&self) -> bool {
        self.stage.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::pipeline::StorageLayout;
    use std::fs;
    use tempfile::TempDir;

    fn namespace(temp_dir: &TempDir) -> ArtifactNamespace {
        let config = ConfigBuilder::new()
            .with_data_root(temp_dir.path().to_path_buf())
            .build();
        StorageLayout::from_config(&config.storage).namespace(&VideoId::generate())
    }

    #[test]
    fn test_empty_namespace_has_no_stage() {
        let temp_dir = TempDir::new().unwrap();
        let status = NamespaceStatus::detect(&namespace(&temp_dir)).unwrap();
        assert_eq!(status.stage, None);
        assert!(!status.exists());
    }

    #[test]
    fn test_stage_progression() {
        let temp_dir = TempDir::new().unwrap();
        let ns = namespace(&temp_dir);

        fs::create_dir_all(ns.raw_video().parent().unwrap()).unwrap();
        fs::write(ns.raw_video(), b"video").unwrap();
        assert_eq!(NamespaceStatus::detect(&ns).unwrap().stage, Some(PipelineStage::Uploaded));

        fs::create_dir_all(ns.frames_dir()).unwrap();
        fs::write(ns.frame_path("frame_00000.jpg"), b"x").unwrap();
        fs::write(ns.frame_path("frame_00001.jpg"), b"x").unwrap();
        let status = NamespaceStatus::detect(&ns).unwrap();
        assert_eq!(status.stage, Some(PipelineStage::FramesExtracted));
        assert_eq!(status.frame_count, 2);

        fs::create_dir_all(ns.styled_frames_dir(Style::Cartoon)).unwrap();
        fs::write(ns.styled_frame_path(Style::Cartoon, "frame_00000.jpg"), b"x").unwrap();
        assert_eq!(NamespaceStatus::detect(&ns).unwrap().stage, Some(PipelineStage::Styled));

        fs::create_dir_all(ns.styled_videos_dir()).unwrap();
        fs::write(ns.styled_video(Style::Cartoon), b"mp4").unwrap();
        let status = NamespaceStatus::detect(&ns).unwrap();
        assert_eq!(status.stage, Some(PipelineStage::VideoAssembled));
        assert_eq!(
            status.styles,
            vec![StyleStatus {
                style: Style::Cartoon,
                styled_frames: 1,
                video_assembled: true,
            }]
        );
    }

    #[test]
    fn test_progress_is_monotonic() {
        let stages = [
            PipelineStage::Uploaded,
            PipelineStage::FramesExtracted,
            PipelineStage::Styled,
            PipelineStage::VideoAssembled,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].progress_percentage() < pair[1].progress_percentage());
        }
    }
}
