//! k-means colour quantization
//!
//! Each attempt starts from centroids drawn uniformly inside the bounding box
//! of the data, using an RNG seeded with the attempt number, so results are
//! reproducible. Attempts run in parallel and the most compact clustering
//! wins.

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Stopping rule for one k-means attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansCriteria {
    /// Stop after this many refinement iterations
    pub max_iterations: usize,
    /// Stop once no centroid moves further than this
    pub epsilon: f32,
    /// Independent random restarts, best kept
    pub attempts: usize,
}

impl Default for KMeansCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            epsilon: 1.0,
            attempts: 10,
        }
    }
}

/// Outcome of a clustering run
#[derive(Debug, Clone)]
pub struct Clustering {
    pub centers: Vec<[f32; 3]>,
    pub labels: Vec<usize>,
    /// Sum of squared distances from each point to its centre
    pub compactness: f64,
}

/// Cluster `points` into at most `k` groups
pub fn kmeans(points: &[[f32; 3]], k: usize, criteria: &KMeansCriteria) -> Clustering {
    let k = k.max(1).min(points.len());
    if k == 0 {
        return Clustering {
            centers: Vec::new(),
            labels: Vec::new(),
            compactness: 0.0,
        };
    }

    (0..criteria.attempts.max(1))
        .into_par_iter()
        .map(|attempt| run_attempt(points, k, criteria, attempt as u64))
        .reduce_with(|best, candidate| {
            if candidate.compactness < best.compactness {
                candidate
            } else {
                best
            }
        })
        .unwrap_or_else(|| run_attempt(points, k, criteria, 0))
}

/// Replace every pixel with the centre of its colour cluster
pub fn quantize_colors(frame: &RgbImage, k: usize, criteria: &KMeansCriteria) -> RgbImage {
    let points: Vec<[f32; 3]> = frame
        .pixels()
        .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
        .collect();

    let clustering = kmeans(&points, k, criteria);
    let palette: Vec<Rgb<u8>> = clustering
        .centers
        .iter()
        .map(|c| Rgb([to_channel(c[0]), to_channel(c[1]), to_channel(c[2])]))
        .collect();

    let mut out = RgbImage::new(frame.width(), frame.height());
    for (pixel, &label) in out.pixels_mut().zip(clustering.labels.iter()) {
        *pixel = palette[label];
    }
    out
}

fn to_channel(value: f32) -> u8 {
    // float -> u8 conversion truncates after clamping
    value.clamp(0.0, 255.0) as u8
}

fn run_attempt(points: &[[f32; 3]], k: usize, criteria: &KMeansCriteria, seed: u64) -> Clustering {
    let mut rng = StdRng::seed_from_u64(seed);
    let (lo, hi) = bounding_box(points);

    let mut centers: Vec<[f32; 3]> = (0..k)
        .map(|_| {
            let mut c = [0f32; 3];
            for d in 0..3 {
                c[d] = lo[d] + rng.gen::<f32>() * (hi[d] - lo[d]);
            }
            c
        })
        .collect();

    let mut labels = vec![0usize; points.len()];
    for _ in 0..criteria.max_iterations.max(1) {
        assign(points, &centers, &mut labels);
        let updated = recompute_centers(points, &labels, &centers);
        let max_shift = centers
            .iter()
            .zip(updated.iter())
            .map(|(a, b)| distance_sq(a, b).sqrt())
            .fold(0f32, f32::max);
        centers = updated;
        if max_shift <= criteria.epsilon {
            break;
        }
    }

    let compactness = assign(points, &centers, &mut labels);
    Clustering {
        centers,
        labels,
        compactness,
    }
}

fn bounding_box(points: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    let mut lo = [f32::MAX; 3];
    let mut hi = [f32::MIN; 3];
    for p in points {
        for d in 0..3 {
            lo[d] = lo[d].min(p[d]);
            hi[d] = hi[d].max(p[d]);
        }
    }
    (lo, hi)
}

/// Label each point with its nearest centre, returning the compactness
fn assign(points: &[[f32; 3]], centers: &[[f32; 3]], labels: &mut [usize]) -> f64 {
    let mut compactness = 0f64;
    for (point, label) in points.iter().zip(labels.iter_mut()) {
        let mut best = 0;
        let mut best_dist = f32::MAX;
        for (i, center) in centers.iter().enumerate() {
            let dist = distance_sq(point, center);
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
        *label = best;
        compactness += best_dist as f64;
    }
    compactness
}

/// Mean of each cluster; an empty cluster takes over the point lying
/// furthest from its current centre.
fn recompute_centers(points: &[[f32; 3]], labels: &[usize], previous: &[[f32; 3]]) -> Vec<[f32; 3]> {
    let k = previous.len();
    let mut sums = vec![[0f64; 3]; k];
    let mut counts = vec![0usize; k];
    for (p, &label) in points.iter().zip(labels.iter()) {
        for d in 0..3 {
            sums[label][d] += p[d] as f64;
        }
        counts[label] += 1;
    }

    let mut centers: Vec<[f32; 3]> = (0..k)
        .map(|i| {
            if counts[i] == 0 {
                previous[i]
            } else {
                let n = counts[i] as f64;
                [(sums[i][0] / n) as f32, (sums[i][1] / n) as f32, (sums[i][2] / n) as f32]
            }
        })
        .collect();

    for i in 0..k {
        if counts[i] > 0 {
            continue;
        }
        let farthest = points
            .iter()
            .zip(labels.iter())
            .filter(|(_, &label)| counts[label] > 1)
            .max_by(|(a, &la), (b, &lb)| {
                distance_sq(a, &centers[la]).total_cmp(&distance_sq(b, &centers[lb]))
            })
            .map(|(p, &label)| (*p, label));
        if let Some((point, donor)) = farthest {
            centers[i] = point;
            counts[donor] -= 1;
            counts[i] = 1;
        }
    }

    centers
}

fn distance_sq(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}
