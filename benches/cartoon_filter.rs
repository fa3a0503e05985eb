use cartoonizer::style::cartoon::{adaptive_threshold_mean, bilateral_filter};
use cartoonizer::style::quantize::{quantize_colors, KMeansCriteria};
use cartoonizer::{CartoonFilter, Style};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgb, RgbImage};
use std::time::Duration;

fn test_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width) as u8,
            (y * 255 / height) as u8,
            ((x + y) % 256) as u8,
        ])
    })
}

/// Benchmark the complete cartoon transform on a 640x480 frame
fn bench_cartoon_transform(c: &mut Criterion) {
    let filter = CartoonFilter::default();
    let frame = test_frame(640, 480);

    let mut group = c.benchmark_group("cartoon");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));
    group.bench_function("transform_640x480", |b| {
        b.iter(|| filter.transform(black_box(&frame)))
    });
    group.finish();
}

/// Benchmark the individual filter stages
fn bench_filter_stages(c: &mut Criterion) {
    let frame = test_frame(640, 480);
    let gray = cartoonizer::style::to_luma(&frame);

    let mut group = c.benchmark_group("stages");
    group.sample_size(10);
    group.bench_function("bilateral_d9", |b| {
        b.iter(|| bilateral_filter(black_box(&frame), 9, 75.0, 75.0))
    });
    group.bench_function("adaptive_threshold_b9", |b| {
        b.iter(|| adaptive_threshold_mean(black_box(&gray), 9, 2))
    });
    group.bench_function("kmeans_k9_single_attempt", |b| {
        let criteria = KMeansCriteria {
            attempts: 1,
            ..KMeansCriteria::default()
        };
        b.iter(|| quantize_colors(black_box(&frame), 9, &criteria))
    });
    group.finish();
}

/// Benchmark the grayscale style for comparison
fn bench_grayscale(c: &mut Criterion) {
    let frame = test_frame(1280, 720);
    c.bench_function("grayscale_1280x720", |b| {
        b.iter(|| Style::Grayscale.transform(black_box(&frame)))
    });
}

criterion_group!(
    benches,
    bench_cartoon_transform,
    bench_filter_stages,
    bench_grayscale
);
criterion_main!(benches);
