//! Style transform registry
//!
//! The set of styles is closed: [`Style`] enumerates every supported
//! transform and unknown names are rejected when parsing, before any file is
//! touched.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::frames;

pub mod cartoon;
pub mod quantize;

pub use cartoon::{CartoonFilter, CartoonParams};
pub use quantize::KMeansCriteria;

/// A registered per-frame transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    /// Flat quantized colour with black line art
    Cartoon,
    /// Luminance only, replicated across the three channels
    Grayscale,
}

impl Style {
    pub const ALL: [Style; 2] = [Style::Cartoon, Style::Grayscale];

    pub fn name(&self) -> &'static str {
        match self {
            Style::Cartoon => "cartoon",
            Style::Grayscale => "grayscale",
        }
    }

    pub fn transform(&self, frame: &RgbImage) -> RgbImage {
        match self {
            Style::Cartoon => CartoonFilter::default().transform(frame),
            Style::Grayscale => grayscale(frame),
        }
    }

    /// Read `input`, transform it and write the result to `output`
    pub fn apply_file(&self, input: &Path, output: &Path, jpeg_quality: u8) -> Result<()> {
        let frame = frames::load_frame(input)?;
        let styled = self.transform(&frame);
        frames::save_frame(&styled, output, jpeg_quality)?;
        debug!("🎨 {} -> {} ({})", input.display(), output.display(), self);
        Ok(())
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Style {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cartoon" => Ok(Style::Cartoon),
            "grayscale" => Ok(Style::Grayscale),
            other => Err(PipelineError::UnsupportedStyle(format!(
                "'{}' (supported: {})",
                other,
                Style::ALL.map(|s| s.name()).join(", ")
            ))),
        }
    }
}

/// Resolve `style_name` and apply it to one frame file
///
/// The name is validated first so an unknown style performs no I/O.
pub fn apply(style_name: &str, input: &Path, output: &Path, jpeg_quality: u8) -> Result<()> {
    let style: Style = style_name.parse()?;
    style.apply_file(input, output, jpeg_quality)
}

/// BT.601 luma in 14-bit fixed point
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + 8192) >> 14) as u8
}

/// Single-channel luminance of an RGB frame
pub fn to_luma(frame: &RgbImage) -> image::GrayImage {
    image::GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b] = frame.get_pixel(x, y).0;
        image::Luma([luma(r, g, b)])
    })
}

fn grayscale(frame: &RgbImage) -> RgbImage {
    RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b] = frame.get_pixel(x, y).0;
        let l = luma(r, g, b);
        image::Rgb([l, l, l])
    })
}
