//! Artifact pipeline
//!
//! Per video id the artifacts move through
//! `Uploaded -> FramesExtracted -> Styled(style) -> VideoAssembled(style)`.
//! Every stage checks that its predecessor's artifacts exist and overwrites
//! its own output when re-run. Stages are blocking; async callers should
//! run them on a blocking thread.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::frames::{self, FrameRef};
use crate::state::NamespaceStatus;
use crate::style::Style;
use crate::video::FrameCodec;

pub mod locks;
pub mod namespace;

pub use locks::{NamespaceGuard, NamespaceLocks};
pub use namespace::{ArtifactNamespace, StorageLayout, VideoId};

/// Outcome of a full upload-to-video run
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub video_id: VideoId,
    pub frame_count: usize,
    pub styled_frames: Vec<String>,
    pub video_path: PathBuf,
}

#[derive(Debug)]
pub struct ArtifactPipeline {
    layout: StorageLayout,
    codec: FrameCodec,
    fps: u32,
    jpeg_quality: u8,
    cleanup_on_failure: bool,
    locks: NamespaceLocks,
}

impl ArtifactPipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            layout: StorageLayout::from_config(&config.storage),
            codec: FrameCodec::new(config.codec.clone()),
            fps: config.codec.fps,
            jpeg_quality: config.codec.jpeg_quality,
            cleanup_on_failure: config.pipeline.cleanup_on_failure,
            locks: NamespaceLocks::new(),
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    pub fn namespace(&self, id: &VideoId) -> ArtifactNamespace {
        self.layout.namespace(id)
    }

    /// Create the four storage roots
    pub fn init_storage(&self) -> Result<()> {
        for root in self.layout.roots() {
            fs::create_dir_all(root)?;
        }
        debug!("📁 Storage roots ready under {}", self.layout.uploads.display());
        Ok(())
    }

    /// Store a raw video under a freshly minted id
    pub fn upload(&self, video_bytes: &[u8]) -> Result<VideoId> {
        if video_bytes.is_empty() {
            return Err(PipelineError::InvalidInput("uploaded video is empty".into()));
        }

        let id = VideoId::generate();
        let namespace = self.namespace(&id);
        let _guard = self.locks.lock(&id);

        let raw_video = namespace.raw_video();
        if let Some(parent) = raw_video.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&raw_video, video_bytes)?;

        info!("📥 Uploaded {} bytes as {}", video_bytes.len(), raw_video.display());
        Ok(id)
    }

    /// Decode the raw video into `frames/{id}/`
    pub fn extract(&self, id: &VideoId) -> Result<usize> {
        let namespace = self.namespace(id);
        let _guard = self.locks.lock(id);
        self.extract_locked(&namespace)
    }

    /// Apply `style_name` to every extracted frame
    ///
    /// Returns the processed frame names in playback order. A failure part
    /// way through leaves the frames styled so far in place.
    pub fn style_all(&self, id: &VideoId, style_name: &str) -> Result<Vec<String>> {
        let style: Style = style_name.parse()?;
        let namespace = self.namespace(id);
        let _guard = self.locks.lock(id);
        self.style_all_locked(&namespace, style)
    }

    /// Apply `style_name` to a single named frame
    ///
    /// Any file present in the frames directory is accepted.
    pub fn style_one(&self, id: &VideoId, style_name: &str, frame_name: &str) -> Result<PathBuf> {
        let style: Style = style_name.parse()?;
        frames::validate_frame_name(frame_name)?;
        let namespace = self.namespace(id);
        let _guard = self.locks.lock(id);

        let input = namespace.frame_path(frame_name);
        if !input.is_file() {
            return Err(PipelineError::NotFound(format!(
                "frame {} for video {}",
                frame_name, id
            )));
        }

        let output = namespace.styled_frame_path(style, frame_name);
        style.apply_file(&input, &output, self.jpeg_quality)?;
        info!("🎨 Styled {} of {} with {}", frame_name, id, style);
        Ok(output)
    }

    /// Encode the styled frames of `style_name` into `styled_videos/{id}/{style}.mp4`
    pub fn assemble(&self, id: &VideoId, style_name: &str) -> Result<PathBuf> {
        let style: Style = style_name.parse()?;
        let namespace = self.namespace(id);
        let _guard = self.locks.lock(id);
        self.assemble_locked(&namespace, style)
    }

    /// Location of an assembled video, which must exist
    pub fn styled_video_path(&self, id: &VideoId, style_name: &str) -> Result<PathBuf> {
        let style: Style = style_name.parse()?;
        let path = self.namespace(id).styled_video(style);
        if !path.is_file() {
            return Err(PipelineError::NotFound(format!(
                "{} video for {}",
                style, id
            )));
        }
        Ok(path)
    }

    /// Location of a styled frame, which must exist
    pub fn styled_frame_path(&self, id: &VideoId, style_name: &str, frame_name: &str) -> Result<PathBuf> {
        let style: Style = style_name.parse()?;
        frames::validate_frame_name(frame_name)?;
        let path = self.namespace(id).styled_frame_path(style, frame_name);
        if !path.is_file() {
            return Err(PipelineError::NotFound(format!(
                "{} frame {} for {}",
                style, frame_name, id
            )));
        }
        Ok(path)
    }

    /// Remove every artifact of `id` across all storage roots
    ///
    /// Uploads match by file-name prefix, the other roots by a directory
    /// named exactly after the id.
    pub fn delete(&self, id: &VideoId) -> Result<Vec<PathBuf>> {
        let namespace = self.namespace(id);
        let _guard = self.locks.lock(id);

        let removed = self.remove_namespace(&namespace)?;
        if removed.is_empty() {
            return Err(PipelineError::NotFound(format!("video {}", id)));
        }

        info!("🗑️ Deleted {} artifacts for {}", removed.len(), id);
        Ok(removed)
    }

    /// Empty all four storage roots
    pub fn delete_all(&self) -> Result<usize> {
        let _all = self.locks.lock_all();

        let mut removed = 0;
        for root in self.layout.roots() {
            if !root.is_dir() {
                continue;
            }
            for entry in fs::read_dir(root)? {
                let path = entry?.path();
                remove_path(&path)?;
                removed += 1;
            }
        }

        warn!("🧹 Deleted all artifacts ({} entries)", removed);
        Ok(removed)
    }

    /// File names in the uploads root, sorted
    pub fn list_uploads(&self) -> Result<Vec<String>> {
        if !self.layout.uploads.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.layout.uploads)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort_by(|a, b| frames::natural_cmp(a, b));
        Ok(names)
    }

    /// What exists on disk for `id`; unknown ids are `NotFound`
    pub fn status(&self, id: &VideoId) -> Result<NamespaceStatus> {
        let status = NamespaceStatus::detect(&self.namespace(id))?;
        if !status.exists() {
            return Err(PipelineError::NotFound(format!("video {}", id)));
        }
        Ok(status)
    }

    /// Upload, extract, style every frame and assemble in one call
    ///
    /// The style is validated before anything is written. When a later
    /// stage fails and `cleanup_on_failure` is set, the partially built
    /// namespace is removed; otherwise it is left for inspection. Either
    /// way the error message names the minted id.
    pub fn full_pipeline(&self, video_bytes: &[u8], style_name: &str) -> Result<PipelineRun> {
        let style: Style = style_name.parse()?;
        let started = Instant::now();

        let id = self.upload(video_bytes)?;
        let namespace = self.namespace(&id);
        let _guard = self.locks.lock(&id);
        let mut cleanup = CleanupOnFailure::new(self, &namespace);

        let stages = || -> Result<(usize, Vec<String>, PathBuf)> {
            let frame_count = self.extract_locked(&namespace)?;
            let styled_frames = self.style_all_locked(&namespace, style)?;
            let video_path = self.assemble_locked(&namespace, style)?;
            Ok((frame_count, styled_frames, video_path))
        };
        let (frame_count, styled_frames, video_path) = stages().map_err(|e| {
            let artifacts = if self.cleanup_on_failure { "removed" } else { "kept" };
            e.with_context(format!("full pipeline for video {} failed, artifacts {}", id, artifacts))
        })?;
        cleanup.disarm();

        info!("🎉 Full pipeline for {} finished in {:.2}s", id, started.elapsed().as_secs_f64());
        Ok(PipelineRun {
            video_id: id,
            frame_count,
            styled_frames,
            video_path,
        })
    }

    fn extract_locked(&self, namespace: &ArtifactNamespace) -> Result<usize> {
        let raw_video = namespace.raw_video();
        if !raw_video.is_file() {
            return Err(PipelineError::NotFound(format!("uploaded video for {}", namespace.id())));
        }

        let count = self.codec.decode_to_frames(&raw_video, &namespace.frames_dir())?;
        debug!("{} frames extracted for {}", count, namespace.id());
        Ok(count)
    }

    fn style_all_locked(&self, namespace: &ArtifactNamespace, style: Style) -> Result<Vec<String>> {
        let sources = frames::list_frames(&namespace.frames_dir())?;
        if sources.is_empty() {
            return Err(PipelineError::NotFound(format!(
                "no extracted frames for {}",
                namespace.id()
            )));
        }

        let started = Instant::now();
        let mut processed = Vec::with_capacity(sources.len());
        for source in &sources {
            let name = source.file_name();
            let output = namespace.styled_frame_path(style, &name);
            style.apply_file(&source.path, &output, self.jpeg_quality)?;
            processed.push(name);
        }

        info!("🎨 {} frames of {} styled with {} in {:.2}s",
              processed.len(), namespace.id(), style, started.elapsed().as_secs_f64());
        Ok(processed)
    }

    fn assemble_locked(&self, namespace: &ArtifactNamespace, style: Style) -> Result<PathBuf> {
        let styled_dir = namespace.styled_frames_dir(style);
        if !styled_dir.is_dir() {
            return Err(PipelineError::NotFound(format!(
                "no {} frames for {}",
                style,
                namespace.id()
            )));
        }

        let sequence: Vec<FrameRef> = frames::list_frames(&styled_dir)?;
        if sequence.is_empty() {
            return Err(PipelineError::NoFrames(format!(
                "{} has no styled frames",
                styled_dir.display()
            )));
        }

        let out_path = namespace.styled_video(style);
        self.codec
            .encode_frames(&sequence, self.fps, &out_path)
            .map_err(|e| match e {
                PipelineError::NoFrames(msg) => PipelineError::NoFrames(msg),
                other => PipelineError::internal(other),
            })?;

        info!("🎬 Assembled {} video for {}", style, namespace.id());
        Ok(out_path)
    }

    fn remove_namespace(&self, namespace: &ArtifactNamespace) -> Result<Vec<PathBuf>> {
        let id = namespace.id().as_str();
        let mut removed = Vec::new();

        if self.layout.uploads.is_dir() {
            for entry in fs::read_dir(&self.layout.uploads)? {
                let entry = entry?;
                if entry.file_name().to_string_lossy().starts_with(id) {
                    let path = entry.path();
                    remove_path(&path)?;
                    removed.push(path);
                }
            }
        }

        for dir in [
            namespace.frames_dir(),
            namespace.styled_frames_base(),
            namespace.styled_videos_dir(),
        ] {
            if dir.exists() {
                remove_path(&dir)?;
                removed.push(dir);
            }
        }

        Ok(removed)
    }
}

/// Removes a namespace on drop unless disarmed
struct CleanupOnFailure<'a> {
    pipeline: &'a ArtifactPipeline,
    namespace: &'a ArtifactNamespace,
    armed: bool,
}

impl<'a> CleanupOnFailure<'a> {
    fn new(pipeline: &'a ArtifactPipeline, namespace: &'a ArtifactNamespace) -> Self {
        Self {
            pipeline,
            namespace,
            armed: pipeline.cleanup_on_failure,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CleanupOnFailure<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.pipeline.remove_namespace(self.namespace) {
            Ok(removed) => info!("🧹 Removed {} partial artifacts for {}", removed.len(), self.namespace.id()),
            Err(e) => warn!("Failed to clean up {}: {}", self.namespace.id(), e),
        }
    }
}

fn remove_path(path: &Path) -> Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn pipeline(temp_dir: &TempDir) -> ArtifactPipeline {
        let config = ConfigBuilder::new()
            .with_data_root(temp_dir.path().to_path_buf())
            .build();
        let pipeline = ArtifactPipeline::new(&config);
        pipeline.init_storage().unwrap();
        pipeline
    }

    fn seed_frames(namespace: &ArtifactNamespace, count: u32) {
        for i in 0..count {
            let frame = RgbImage::from_pixel(16, 12, Rgb([(i * 10) as u8, 60, 200]));
            frames::save_frame(&frame, &namespace.frame_path(&frames::frame_file_name(i)), 90).unwrap();
        }
    }

    fn entry_count(dir: &Path) -> usize {
        fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    }

    #[test]
    fn test_upload_stores_raw_video() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);

        let id = pipeline.upload(b"fake mp4 bytes").unwrap();
        let raw = pipeline.namespace(&id).raw_video();
        assert_eq!(fs::read(&raw).unwrap(), b"fake mp4 bytes");
        assert_eq!(pipeline.list_uploads().unwrap(), vec![format!("{}.mp4", id)]);
    }

    #[test]
    fn test_upload_rejects_empty_body() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);
        assert!(matches!(pipeline.upload(b""), Err(PipelineError::InvalidInput(_))));
        assert!(pipeline.list_uploads().unwrap().is_empty());
    }

    #[test]
    fn test_extract_without_upload_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);
        let result = pipeline.extract(&VideoId::generate());
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }

    #[test]
    fn test_style_all_without_frames_has_no_side_effects() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);
        let id = VideoId::generate();

        let result = pipeline.style_all(&id, "cartoon");
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
        assert_eq!(entry_count(&pipeline.layout().styled_frames), 0);
    }

    #[test]
    fn test_unknown_style_fails_before_io() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);
        let id = VideoId::generate();
        seed_frames(&pipeline.namespace(&id), 2);

        assert!(matches!(pipeline.style_all(&id, "bogus"), Err(PipelineError::UnsupportedStyle(_))));
        assert!(matches!(
            pipeline.style_one(&id, "bogus", "frame_00000.jpg"),
            Err(PipelineError::UnsupportedStyle(_))
        ));
        assert!(matches!(pipeline.assemble(&id, "bogus"), Err(PipelineError::UnsupportedStyle(_))));
        assert!(matches!(
            pipeline.full_pipeline(b"bytes", "bogus"),
            Err(PipelineError::UnsupportedStyle(_))
        ));

        assert_eq!(entry_count(&pipeline.layout().styled_frames), 0);
        assert_eq!(entry_count(&pipeline.layout().styled_videos), 0);
        assert_eq!(entry_count(&pipeline.layout().uploads), 0);
    }

    #[test]
    fn test_style_all_processes_images_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);
        let id = VideoId::generate();
        let namespace = pipeline.namespace(&id);
        seed_frames(&namespace, 12);
        fs::write(namespace.frame_path("notes.txt"), b"not a frame").unwrap();

        let processed = pipeline.style_all(&id, "grayscale").unwrap();
        assert_eq!(processed.len(), 12);
        assert_eq!(processed[0], "frame_00000.jpg");
        assert_eq!(processed[2], "frame_00002.jpg");
        assert_eq!(processed[11], "frame_00011.jpg");

        let styled = frames::list_frames(&namespace.styled_frames_dir(Style::Grayscale)).unwrap();
        assert_eq!(styled.len(), 12);
        assert!(!namespace.styled_frame_path(Style::Grayscale, "notes.txt").exists());
    }

    #[test]
    fn test_style_one() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);
        let id = VideoId::generate();
        seed_frames(&pipeline.namespace(&id), 1);

        let out = pipeline.style_one(&id, "grayscale", "frame_00000.jpg").unwrap();
        assert!(out.is_file());
        assert_eq!(
            pipeline.styled_frame_path(&id, "grayscale", "frame_00000.jpg").unwrap(),
            out
        );

        let missing = pipeline.style_one(&id, "grayscale", "frame_00099.jpg");
        assert!(matches!(missing, Err(PipelineError::NotFound(_))));

        let traversal = pipeline.style_one(&id, "grayscale", "../frame_00000.jpg");
        assert!(matches!(traversal, Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn test_assemble_requires_styled_frames() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);
        let id = VideoId::generate();
        let namespace = pipeline.namespace(&id);

        assert!(matches!(pipeline.assemble(&id, "cartoon"), Err(PipelineError::NotFound(_))));

        fs::create_dir_all(namespace.styled_frames_dir(Style::Cartoon)).unwrap();
        assert!(matches!(pipeline.assemble(&id, "cartoon"), Err(PipelineError::NoFrames(_))));
        assert!(!namespace.styled_video(Style::Cartoon).exists());
    }

    #[test]
    fn test_download_paths_require_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);
        let id = VideoId::generate();

        assert!(matches!(pipeline.styled_video_path(&id, "cartoon"), Err(PipelineError::NotFound(_))));
        assert!(matches!(
            pipeline.styled_frame_path(&id, "cartoon", "frame_00000.jpg"),
            Err(PipelineError::NotFound(_))
        ));
        assert!(matches!(
            pipeline.styled_video_path(&id, "sepia"),
            Err(PipelineError::UnsupportedStyle(_))
        ));
    }

    #[test]
    fn test_delete_removes_only_that_id() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);

        let keep = pipeline.upload(b"keep").unwrap();
        let id = pipeline.upload(b"drop").unwrap();
        let namespace = pipeline.namespace(&id);
        seed_frames(&namespace, 2);
        pipeline.style_all(&id, "grayscale").unwrap();
        fs::create_dir_all(namespace.styled_videos_dir()).unwrap();
        fs::write(namespace.styled_video(Style::Grayscale), b"mp4").unwrap();

        let removed = pipeline.delete(&id).unwrap();
        assert_eq!(removed.len(), 4);
        assert!(!namespace.raw_video().exists());
        assert!(!namespace.frames_dir().exists());
        assert!(!namespace.styled_frames_base().exists());
        assert!(!namespace.styled_videos_dir().exists());
        assert!(pipeline.namespace(&keep).raw_video().exists());

        // Second delete finds nothing
        assert!(matches!(pipeline.delete(&id), Err(PipelineError::NotFound(_))));
    }

    #[test]
    fn test_delete_matches_upload_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);
        let id = VideoId::generate();
        fs::write(pipeline.layout().uploads.join(format!("{}_holiday.mp4", id)), b"x").unwrap();

        let removed = pipeline.delete(&id).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(entry_count(&pipeline.layout().uploads), 0);
    }

    #[test]
    fn test_delete_all_empties_roots() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);
        let a = pipeline.upload(b"a").unwrap();
        pipeline.upload(b"b").unwrap();
        seed_frames(&pipeline.namespace(&a), 1);

        assert_eq!(pipeline.delete_all().unwrap(), 3);
        for root in pipeline.layout().roots() {
            assert!(root.is_dir());
            assert_eq!(entry_count(root), 0);
        }
    }

    #[test]
    fn test_status() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);

        assert!(matches!(pipeline.status(&VideoId::generate()), Err(PipelineError::NotFound(_))));

        let id = pipeline.upload(b"video").unwrap();
        seed_frames(&pipeline.namespace(&id), 3);
        let status = pipeline.status(&id).unwrap();
        assert!(status.uploaded);
        assert_eq!(status.frame_count, 3);
        assert_eq!(status.stage, Some(crate::state::PipelineStage::FramesExtracted));
    }

    #[test]
    fn test_full_pipeline_cleanup_on_failure() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigBuilder::new()
            .with_data_root(temp_dir.path().to_path_buf())
            .cleanup_on_failure(true)
            .build();
        let pipeline = ArtifactPipeline::new(&config);
        pipeline.init_storage().unwrap();

        // Not a video: extraction fails after the upload was written
        assert!(pipeline.full_pipeline(b"garbage", "cartoon").is_err());
        assert_eq!(entry_count(&pipeline.layout().uploads), 0);
        assert_eq!(entry_count(&pipeline.layout().frames), 0);
    }

    #[test]
    fn test_full_pipeline_keeps_partial_artifacts_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);

        let err = pipeline.full_pipeline(b"garbage", "cartoon").unwrap_err();
        let uploads = pipeline.list_uploads().unwrap();
        assert_eq!(uploads.len(), 1);

        // The failure names the id so the kept namespace can be found again
        let id = uploads[0].trim_end_matches(".mp4");
        let message = err.to_string();
        assert!(message.contains(id), "{}", message);
        assert!(message.contains("artifacts kept"), "{}", message);
        assert!(pipeline.status(&VideoId::parse(id).unwrap()).unwrap().uploaded);
    }
}
