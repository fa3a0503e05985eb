//! Cartoon filter
//!
//! Fixed pipeline applied to every frame:
//!
//! 1. resize to the canonical 640x480 resolution
//! 2. two passes of edge-preserving bilateral smoothing (d=9, sigma 75/75)
//! 3. luminance, 7x7 median blur, then adaptive mean threshold (block 9,
//!    offset 2) to get a white mask with black line art
//! 4. k-means palette reduction to 9 colours
//! 5. keep the quantized colour where the mask is set, black elsewhere
//!
//! The output is always exactly the canonical size, whatever the input was.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::median_filter;
use rayon::prelude::*;
use std::path::Path;

use super::quantize::{quantize_colors, KMeansCriteria};
use super::to_luma;
use crate::error::Result;
use crate::frames;

/// Tunables of the cartoon filter; [`Default`] holds the production values
#[derive(Debug, Clone, PartialEq)]
pub struct CartoonParams {
    pub width: u32,
    pub height: u32,
    pub bilateral_passes: usize,
    pub bilateral_diameter: u32,
    pub sigma_color: f32,
    pub sigma_space: f32,
    pub median_kernel: u32,
    pub threshold_block: u32,
    pub threshold_offset: i32,
    pub colors: usize,
    pub kmeans: KMeansCriteria,
}

impl Default for CartoonParams {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            bilateral_passes: 2,
            bilateral_diameter: 9,
            sigma_color: 75.0,
            sigma_space: 75.0,
            median_kernel: 7,
            threshold_block: 9,
            threshold_offset: 2,
            colors: 9,
            kmeans: KMeansCriteria::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CartoonFilter {
    params: CartoonParams,
}

impl CartoonFilter {
    pub fn new(params: CartoonParams) -> Self {
        Self { params }
    }

    /// Cartoonize an image file
    pub fn transform_file(&self, path: &Path) -> Result<RgbImage> {
        let frame = frames::load_frame(path)?;
        Ok(self.transform(&frame))
    }

    pub fn transform(&self, frame: &RgbImage) -> RgbImage {
        let p = &self.params;

        let mut smoothed = imageops::resize(frame, p.width, p.height, FilterType::Triangle);
        for _ in 0..p.bilateral_passes {
            smoothed = bilateral_filter(&smoothed, p.bilateral_diameter, p.sigma_color, p.sigma_space);
        }

        let gray = to_luma(&smoothed);
        let radius = p.median_kernel / 2;
        let blurred = median_filter(&gray, radius, radius);
        let edges = adaptive_threshold_mean(&blurred, p.threshold_block, p.threshold_offset);

        let quantized = quantize_colors(&smoothed, p.colors, &p.kmeans);
        mask_with_edges(&quantized, &edges)
    }
}

/// Bilateral filter over a circular window of `diameter`
///
/// Colour distance is the L1 sum of channel differences; borders reflect
/// without repeating the edge pixel.
pub fn bilateral_filter(src: &RgbImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> RgbImage {
    let (width, height) = src.dimensions();
    let radius = (diameter / 2).max(1) as i32;
    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    let mut window = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2.sqrt() > radius as f32 {
                continue;
            }
            window.push((dx, dy, (r2 * space_coeff).exp()));
        }
    }

    let color_weight: Vec<f32> = (0..=3 * 255)
        .map(|i| ((i * i) as f32 * color_coeff).exp())
        .collect();

    let row_len = width as usize * 3;
    let mut out = RgbImage::new(width, height);
    let raw: &mut [u8] = &mut out;
    raw.par_chunks_mut(row_len).enumerate().for_each(|(y, row)| {
        let y = y as i32;
        for x in 0..width as i32 {
            let center = src.get_pixel(x as u32, y as u32).0;
            let mut sum = [0f32; 3];
            let mut weight_sum = 0f32;
            for &(dx, dy, space_weight) in &window {
                let sx = reflect101(x + dx, width as i32);
                let sy = reflect101(y + dy, height as i32);
                let px = src.get_pixel(sx, sy).0;
                let diff = (px[0] as i32 - center[0] as i32).abs()
                    + (px[1] as i32 - center[1] as i32).abs()
                    + (px[2] as i32 - center[2] as i32).abs();
                let w = space_weight * color_weight[diff as usize];
                sum[0] += px[0] as f32 * w;
                sum[1] += px[1] as f32 * w;
                sum[2] += px[2] as f32 * w;
                weight_sum += w;
            }
            let base = x as usize * 3;
            for c in 0..3 {
                row[base + c] = (sum[c] / weight_sum).round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    out
}

/// Binary threshold against the local mean of a `block` x `block` window
///
/// A pixel becomes 255 when it is brighter than `mean - offset`, 0
/// otherwise. The window replicates edge pixels at the border.
pub fn adaptive_threshold_mean(src: &GrayImage, block: u32, offset: i32) -> GrayImage {
    let (width, height) = src.dimensions();
    let radius = (block / 2) as i32;
    let area = ((2 * radius + 1) * (2 * radius + 1)) as f32;

    // Horizontal running sums, then vertical
    let mut horizontal = vec![0u32; (width * height) as usize];
    for y in 0..height {
        for x in 0..width as i32 {
            let mut acc = 0u32;
            for dx in -radius..=radius {
                let sx = (x + dx).clamp(0, width as i32 - 1) as u32;
                acc += src.get_pixel(sx, y)[0] as u32;
            }
            horizontal[(y * width + x as u32) as usize] = acc;
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let mut acc = 0u32;
        for dy in -radius..=radius {
            let sy = (y as i32 + dy).clamp(0, height as i32 - 1) as u32;
            acc += horizontal[(sy * width + x) as usize];
        }
        let mean = (acc as f32 / area).round() as i32;
        if src.get_pixel(x, y)[0] as i32 > mean - offset {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Keep colour where the mask is set, black elsewhere
pub fn mask_with_edges(color: &RgbImage, mask: &GrayImage) -> RgbImage {
    RgbImage::from_fn(color.width(), color.height(), |x, y| {
        if mask.get_pixel(x, y)[0] > 0 {
            *color.get_pixel(x, y)
        } else {
            Rgb([0, 0, 0])
        }
    })
}

fn reflect101(i: i32, len: i32) -> u32 {
    if len <= 1 {
        return 0;
    }
    let mut i = i;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * len - 2 - i;
        } else {
            return i as u32;
        }
    }
}
