//! Frame naming, ordering and discovery
//!
//! Frames are stored as `frame_NNNNN.jpg`. Each [`FrameRef`] carries its
//! numeric sequence index so playback order never depends on how file names
//! happen to sort; names that do not follow the convention fall back to a
//! numeric-aware ("natural") comparison.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use regex::Regex;
use std::cmp::Ordering;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

use crate::error::{PipelineError, Result};

/// Extension used for extracted and styled frames
pub const FRAME_EXTENSION: &str = "jpg";

/// Extensions accepted when scanning a frame directory
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Name of the frame at `index`, zero-padded to five digits
pub fn frame_file_name(index: u32) -> String {
    format!("frame_{:05}.{}", index, FRAME_EXTENSION)
}

fn frame_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^frame_(\d+)\.[A-Za-z]+$").expect("valid frame pattern"))
}

/// Parse the sequence index out of a `frame_NNNNN.ext` name
pub fn parse_frame_index(name: &str) -> Option<u32> {
    frame_name_pattern()
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Whether a path has one of the recognised image extensions
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reject anything that is not a bare file name
pub fn validate_frame_name(name: &str) -> Result<()> {
    let is_bare = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\');
    if is_bare {
        Ok(())
    } else {
        Err(PipelineError::InvalidInput(format!("invalid frame name: {name}")))
    }
}

/// A frame on disk together with its position in the sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRef {
    /// Sequence index, `None` for names outside the `frame_NNNNN` scheme
    pub index: Option<u32>,
    pub path: PathBuf,
}

impl FrameRef {
    pub fn new(path: PathBuf) -> Self {
        let index = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_frame_index);
        Self { index, path }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

impl Ord for FrameRef {
    fn cmp(&self, other: &Self) -> Ordering {
        // Index order agrees with natural order on `frame_N` names, so ties
        // and mixed pairs both fall through to the same natural comparison
        let by_index = match (self.index, other.index) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => Ordering::Equal,
        };
        by_index
            .then_with(|| natural_cmp(&self.file_name(), &other.file_name()))
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl PartialOrd for FrameRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Numeric-aware string comparison: `frame_2` sorts before `frame_10`
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();

    loop {
        match (a_chars.peek().copied(), b_chars.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left = take_digits(&mut a_chars);
                let right = take_digits(&mut b_chars);
                let left_trimmed = left.trim_start_matches('0');
                let right_trimmed = right.trim_start_matches('0');
                let ord = left_trimmed
                    .len()
                    .cmp(&right_trimmed.len())
                    .then_with(|| left_trimmed.cmp(right_trimmed))
                    .then_with(|| left.len().cmp(&right.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a_chars.next();
                b_chars.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}

/// Decode an image file into an 8-bit RGB frame
pub fn load_frame(path: &Path) -> Result<RgbImage> {
    if !path.is_file() {
        return Err(PipelineError::NotFound(format!("frame {}", path.display())));
    }
    let img = image::open(path)
        .map_err(|e| PipelineError::UnreadableImage(format!("{}: {}", path.display(), e)))?;
    Ok(img.to_rgb8())
}

/// Write a frame as JPEG, creating parent directories as needed
pub fn save_frame(frame: &RgbImage, path: &Path, quality: u8) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    JpegEncoder::new_with_quality(writer, quality).write_image(
        frame.as_raw(),
        frame.width(),
        frame.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(())
}

/// List the image files directly inside `dir`, in playback order
///
/// A missing directory yields an empty list; callers decide whether that is
/// an error.
pub fn list_frames(dir: &Path) -> Result<Vec<FrameRef>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut frames = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| PipelineError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        let path = entry.path();
        if entry.file_type().is_file() && is_image_file(path) {
            frames.push(FrameRef::new(path.to_path_buf()));
        }
    }

    frames.sort();
    Ok(frames)
}
