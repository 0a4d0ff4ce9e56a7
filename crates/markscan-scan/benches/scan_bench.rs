// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the per-sheet hot path: adaptive thresholding of a
// normalized page and bubble sampling of a warped answer block.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{GrayImage, Luma};

use markscan_scan::{BubbleGridSampler, ImageprocVision, MarkDecisionUnit, VisionEngine};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A 700x900 answer block with one filled bubble per row.
fn answer_block() -> GrayImage {
    let (w, h) = (700u32, 900u32);
    let mut img = GrayImage::from_pixel(w, h, Luma([255u8]));
    for row in 0..25u32 {
        let col = row % 5;
        for y in row * 36..(row + 1) * 36 {
            for x in col * 140..(col + 1) * 140 {
                img.put_pixel(x, y, Luma([0u8]));
            }
        }
    }
    img
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_adaptive_threshold(c: &mut Criterion) {
    let page = GrayImage::from_fn(600, 800, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
    let vision = ImageprocVision::default();

    c.bench_function("adaptive_threshold (600x800)", |b| {
        b.iter(|| black_box(vision.adaptive_threshold(black_box(&page), 53, 4)));
    });
}

fn bench_grid_sampling(c: &mut Criterion) {
    let block = answer_block();
    let sampler = BubbleGridSampler::new(200);
    let decider = MarkDecisionUnit::new(4520);

    c.bench_function("sample_and_decide (25x5)", |b| {
        b.iter(|| {
            let grid = sampler.sample(black_box(&block), 25, 5).unwrap();
            black_box(decider.decide(&grid));
        });
    });
}

criterion_group!(benches, bench_adaptive_threshold, bench_grid_sampling);
criterion_main!(benches);
