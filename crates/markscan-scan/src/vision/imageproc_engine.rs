// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `VisionEngine` backed by the `image` and `imageproc` crates: Canny edges,
// border-following contours, Douglas-Peucker polygon approximation,
// projective warping, and integral-image adaptive thresholding.

use image::{GrayImage, Luma};
use imageproc::contours::{self, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::morphology::dilate;
use imageproc::point::Point;
use markscan_core::config::NormalizerConfig;
use markscan_core::error::{MarkscanError, Result};
use tracing::{debug, instrument};

use super::{Contour, ContourMode, Quad, VisionEngine};

/// Production vision engine.
#[derive(Debug, Clone)]
pub struct ImageprocVision {
    /// Gaussian sigma applied before edge detection; 0 disables blurring.
    blur_sigma: f32,
    canny_low: f32,
    canny_high: f32,
}

impl ImageprocVision {
    pub fn new(blur_sigma: f32, canny_low: f32, canny_high: f32) -> Self {
        Self {
            blur_sigma,
            canny_low,
            canny_high,
        }
    }

    pub fn from_config(config: &NormalizerConfig) -> Self {
        Self::new(config.blur_sigma, config.canny_low, config.canny_high)
    }
}

impl Default for ImageprocVision {
    fn default() -> Self {
        Self::from_config(&NormalizerConfig::default())
    }
}

impl VisionEngine for ImageprocVision {
    /// Canny edges, dilated by one pixel to close hairline gaps at corners.
    fn detect_edges(&self, gray: &GrayImage) -> GrayImage {
        let edges = if self.blur_sigma > 0.0 {
            let blurred = gaussian_blur_f32(gray, self.blur_sigma);
            canny(&blurred, self.canny_low, self.canny_high)
        } else {
            canny(gray, self.canny_low, self.canny_high)
        };
        dilate(&edges, Norm::LInf, 1)
    }

    fn find_contours(&self, binary: &GrayImage, mode: ContourMode) -> Vec<Contour> {
        let traced = contours::find_contours::<i32>(binary);
        let total = traced.len();
        let kept: Vec<Contour> = traced
            .into_iter()
            .filter(|c| match mode {
                ContourMode::All => true,
                ContourMode::External => c.border_type == BorderType::Outer && c.parent.is_none(),
            })
            .map(|c| Contour::new(c.points))
            .collect();
        debug!(total, kept = kept.len(), ?mode, "Contours traced");
        kept
    }

    fn approximate_polygon(&self, contour: &Contour, epsilon_ratio: f64) -> Vec<Point<i32>> {
        let points = &contour.points;
        if points.len() < 3 {
            return points.clone();
        }
        let epsilon = epsilon_ratio * arc_length(points, true);
        if epsilon <= 0.0 {
            return points.clone();
        }

        // Split the closed curve at two mutually distant points. For a
        // quadrilateral these are opposite corners wherever the trace began.
        let n = points.len();
        let a = farthest_from(points, points[0]);
        let b = farthest_from(points, points[a]);
        let split = (b + n - a) % n;
        if split == 0 {
            return vec![points[a]];
        }
        let ring: Vec<Point<i32>> = points[a..].iter().chain(&points[..a]).copied().collect();

        let mut closing: Vec<Point<i32>> = ring[split..].to_vec();
        closing.push(ring[0]);

        let mut vertices = approximate_polygon_dp(&ring[..=split], epsilon, false);
        let second = approximate_polygon_dp(&closing, epsilon, false);
        // Both halves share the two split points.
        vertices.pop();
        vertices.extend_from_slice(&second[..second.len() - 1]);
        drop_collinear(vertices, epsilon)
    }

    #[instrument(skip(self, image), fields(src_w = image.width(), src_h = image.height()))]
    fn warp_perspective(
        &self,
        image: &GrayImage,
        quad: &Quad,
        size: (u32, u32),
    ) -> Result<GrayImage> {
        let (out_w, out_h) = size;
        if out_w == 0 || out_h == 0 {
            return Err(MarkscanError::MalformedSheetInput(format!(
                "cannot warp onto an empty {out_w}x{out_h} rectangle"
            )));
        }

        let dest: [(f32, f32); 4] = [
            (0.0, 0.0),                   // top-left
            (out_w as f32, 0.0),          // top-right
            (0.0, out_h as f32),          // bottom-left
            (out_w as f32, out_h as f32), // bottom-right
        ];

        let projection = Projection::from_control_points(quad.corners(), dest).ok_or_else(|| {
            MarkscanError::MalformedSheetInput(format!("degenerate region corners {quad:?}"))
        })?;

        let mut output = GrayImage::new(out_w, out_h);
        warp_into(image, &projection, Interpolation::Bilinear, Luma([255u8]), &mut output);
        debug!(out_w, out_h, "Perspective warp applied");
        Ok(output)
    }

    /// Local-mean threshold: a pixel is ink when it is no brighter than the
    /// mean of its `block_radius` window minus `offset`.
    fn adaptive_threshold(&self, gray: &GrayImage, block_radius: u32, offset: i32) -> GrayImage {
        let sums = SummedArea::new(gray);
        GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            let cutoff = sums.window_mean(x, y, block_radius) - f64::from(offset);
            let ink = f64::from(gray.get_pixel(x, y).0[0]) <= cutoff;
            Luma([if ink { 0u8 } else { 255u8 }])
        })
    }
}

// -- Polygon helpers ----------------------------------------------------------

fn farthest_from(points: &[Point<i32>], origin: Point<i32>) -> usize {
    points
        .iter()
        .enumerate()
        .max_by_key(|(_, p)| {
            let (dx, dy) = ((p.x - origin.x) as i64, (p.y - origin.y) as i64);
            dx * dx + dy * dy
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Remove vertices lying within `epsilon` of the chord between their
/// neighbours. Never goes below a triangle.
fn drop_collinear(mut vertices: Vec<Point<i32>>, epsilon: f64) -> Vec<Point<i32>> {
    while vertices.len() > 3 {
        let n = vertices.len();
        let flat = (0..n).find(|&i| {
            let prev = vertices[(i + n - 1) % n];
            let next = vertices[(i + 1) % n];
            distance_to_line(vertices[i], prev, next) < epsilon
        });
        match flat {
            Some(i) => {
                vertices.remove(i);
            }
            None => break,
        }
    }
    vertices
}

fn distance_to_line(p: Point<i32>, a: Point<i32>, b: Point<i32>) -> f64 {
    let (dx, dy) = (f64::from(b.x - a.x), f64::from(b.y - a.y));
    let (px, py) = (f64::from(p.x - a.x), f64::from(p.y - a.y));
    let length = dx.hypot(dy);
    if length == 0.0 {
        return px.hypot(py);
    }
    (dx * py - dy * px).abs() / length
}

// -- Summed-area table --------------------------------------------------------

/// Prefix sums over a grayscale image, padded with a zero row and column.
struct SummedArea {
    width: u32,
    height: u32,
    sums: Vec<u64>,
}

impl SummedArea {
    fn new(gray: &GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let stride = width as usize + 1;
        let mut sums = vec![0u64; stride * (height as usize + 1)];
        for (y, row) in gray.rows().enumerate() {
            let mut running = 0u64;
            for (x, px) in row.enumerate() {
                running += u64::from(px.0[0]);
                sums[(y + 1) * stride + x + 1] = running + sums[y * stride + x + 1];
            }
        }
        Self { width, height, sums }
    }

    fn at(&self, x: usize, y: usize) -> u64 {
        self.sums[y * (self.width as usize + 1) + x]
    }

    /// Mean over the square window around (cx, cy), cut at the image edge.
    fn window_mean(&self, cx: u32, cy: u32, radius: u32) -> f64 {
        let x0 = cx.saturating_sub(radius) as usize;
        let y0 = cy.saturating_sub(radius) as usize;
        let x1 = (cx.saturating_add(radius) as usize + 1).min(self.width as usize);
        let y1 = (cy.saturating_add(radius) as usize + 1).min(self.height as usize);
        let count = (x1 - x0) * (y1 - y0);
        if count == 0 {
            return 128.0;
        }
        let total = self.at(x1, y1) + self.at(x0, y0) - self.at(x1, y0) - self.at(x0, y1);
        total as f64 / count as f64
    }
}
