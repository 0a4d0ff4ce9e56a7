// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Vision primitives as a capability. The pipeline stages only ever call
// through `VisionEngine`, so they can be driven by a deterministic fake in
// tests and by `ImageprocVision` in production.

pub mod imageproc_engine;

use std::cmp::Ordering;

use image::GrayImage;
use imageproc::point::Point;
use markscan_core::error::Result;

pub use imageproc_engine::ImageprocVision;

/// Which contours `find_contours` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContourMode {
    /// Every border, including holes and nested shapes.
    All,
    /// Only outermost borders.
    External,
}

/// A traced closed boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    /// Enclosed area via the shoelace formula.
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }
}

/// Engine exposing the image primitives the pipeline is built from.
pub trait VisionEngine {
    /// Binary edge map of a grayscale image.
    fn detect_edges(&self, gray: &GrayImage) -> GrayImage;

    /// Trace contours of the non-zero pixels of `binary`.
    fn find_contours(&self, binary: &GrayImage, mode: ContourMode) -> Vec<Contour>;

    /// Approximate a contour by a closed polygon. The tolerance is
    /// `epsilon_ratio` times the contour's perimeter.
    fn approximate_polygon(&self, contour: &Contour, epsilon_ratio: f64) -> Vec<Point<i32>>;

    /// Map `quad` onto an axis-aligned `size.0` x `size.1` rectangle.
    fn warp_perspective(&self, image: &GrayImage, quad: &Quad, size: (u32, u32))
        -> Result<GrayImage>;

    /// Local-mean binarization. Ink becomes 0, paper 255.
    fn adaptive_threshold(&self, gray: &GrayImage, block_radius: u32, offset: i32) -> GrayImage;
}

/// Four corners of a region in canonical order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub top_left: (f32, f32),
    pub top_right: (f32, f32),
    pub bottom_left: (f32, f32),
    pub bottom_right: (f32, f32),
}

impl Quad {
    /// Canonically order four arbitrary corner points.
    ///
    /// top-left minimises x+y, bottom-right maximises x+y, top-right
    /// minimises y-x, bottom-left maximises y-x. Ties are broken by the
    /// point's own coordinates, so the choice depends only on the point set
    /// and reordering an already ordered quad returns it unchanged.
    pub fn from_corners(points: [(f32, f32); 4]) -> Self {
        let sum = |p: &(f32, f32)| p.0 + p.1;
        let diff = |p: &(f32, f32)| p.1 - p.0;
        let pick_min = |key: &dyn Fn(&(f32, f32)) -> f32| {
            *points
                .iter()
                .min_by(|a, b| compare_by(key, a, b))
                .unwrap_or(&points[0])
        };
        let pick_max = |key: &dyn Fn(&(f32, f32)) -> f32| {
            *points
                .iter()
                .max_by(|a, b| compare_by(key, a, b))
                .unwrap_or(&points[0])
        };

        Self {
            top_left: pick_min(&sum),
            bottom_right: pick_max(&sum),
            top_right: pick_min(&diff),
            bottom_left: pick_max(&diff),
        }
    }

    /// Order the vertices of an approximated polygon. None unless it has
    /// exactly four vertices that land on four distinct corners.
    pub fn from_polygon(vertices: &[Point<i32>]) -> Option<Self> {
        let [a, b, c, d] = vertices else {
            return None;
        };
        let quad = Self::from_corners([
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            (c.x as f32, c.y as f32),
            (d.x as f32, d.y as f32),
        ]);
        let corners = quad.corners();
        let distinct = (0..4).all(|i| (i + 1..4).all(|j| corners[i] != corners[j]));
        (distinct && quad.area() > 0.0).then_some(quad)
    }

    /// Corners as `[top_left, top_right, bottom_left, bottom_right]`.
    pub fn corners(&self) -> [(f32, f32); 4] {
        [self.top_left, self.top_right, self.bottom_left, self.bottom_right]
    }

    /// Multiply every coordinate by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        let s = |p: (f32, f32)| (p.0 * factor, p.1 * factor);
        Self {
            top_left: s(self.top_left),
            top_right: s(self.top_right),
            bottom_left: s(self.bottom_left),
            bottom_right: s(self.bottom_right),
        }
    }

    /// Area enclosed by the quad (vertices walked clockwise).
    pub fn area(&self) -> f32 {
        shoelace_area(&[self.top_left, self.top_right, self.bottom_right, self.bottom_left])
    }

    pub fn centroid(&self) -> (f32, f32) {
        let c = self.corners();
        (
            c.iter().map(|p| p.0).sum::<f32>() / 4.0,
            c.iter().map(|p| p.1).sum::<f32>() / 4.0,
        )
    }

    /// Size of the rectangle that preserves the quad's longest edges.
    pub fn rectified_size(&self) -> (u32, u32) {
        let dist = |a: (f32, f32), b: (f32, f32)| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
        let width = dist(self.top_left, self.top_right).max(dist(self.bottom_left, self.bottom_right));
        let height = dist(self.top_left, self.bottom_left).max(dist(self.top_right, self.bottom_right));
        ((width.round() as u32).max(1), (height.round() as u32).max(1))
    }
}

fn compare_by(key: &dyn Fn(&(f32, f32)) -> f32, a: &(f32, f32), b: &(f32, f32)) -> Ordering {
    key(a)
        .total_cmp(&key(b))
        .then_with(|| a.0.total_cmp(&b.0))
        .then_with(|| a.1.total_cmp(&b.1))
}

/// Area of a polygon given by four ordered vertices (CW or CCW).
pub fn shoelace_area(corners: &[(f32, f32); 4]) -> f32 {
    let n = corners.len();
    let mut area = 0.0f32;
    for i in 0..n {
        let j = (i + 1) % n;
        area += corners[i].0 * corners[j].1;
        area -= corners[j].0 * corners[i].1;
    }
    area.abs() / 2.0
}

/// Area of an arbitrary closed polygon.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    twice.abs() as f64 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skewed() -> [(f32, f32); 4] {
        [(410.0, 380.0), (35.0, 20.0), (20.0, 400.0), (390.0, 15.0)]
    }

    #[test]
    fn corners_are_canonically_ordered() {
        let q = Quad::from_corners(skewed());
        assert_eq!(q.top_left, (35.0, 20.0));
        assert_eq!(q.top_right, (390.0, 15.0));
        assert_eq!(q.bottom_left, (20.0, 400.0));
        assert_eq!(q.bottom_right, (410.0, 380.0));
    }

    #[test]
    fn reordering_is_idempotent() {
        let shapes = [
            skewed(),
            // rotated 45 degrees; sums and differences tie
            [(0.0, 5.0), (5.0, 0.0), (10.0, 5.0), (5.0, 10.0)],
            // degenerate: repeated point
            [(1.0, 1.0), (1.0, 1.0), (8.0, 2.0), (3.0, 9.0)],
            [(100.0, 0.0), (0.0, 0.0), (0.0, 100.0), (100.0, 100.0)],
        ];
        for pts in shapes {
            let once = Quad::from_corners(pts);
            let twice = Quad::from_corners(once.corners());
            assert_eq!(once, twice, "not idempotent for {pts:?}");
        }
    }

    #[test]
    fn only_four_vertex_polygons_become_quads() {
        let tri = [Point::new(0, 0), Point::new(5, 0), Point::new(0, 5)];
        assert!(Quad::from_polygon(&tri).is_none());
        let rect = [Point::new(0, 0), Point::new(10, 0), Point::new(10, 4), Point::new(0, 4)];
        let q = Quad::from_polygon(&rect).unwrap();
        assert!((q.area() - 40.0).abs() < 1e-3);
    }

    #[test]
    fn collapsed_polygons_are_not_quads() {
        let repeated = [Point::new(1, 1), Point::new(1, 1), Point::new(8, 2), Point::new(3, 9)];
        assert!(Quad::from_polygon(&repeated).is_none());
        // four points on one line
        let flat = [Point::new(0, 0), Point::new(3, 3), Point::new(6, 6), Point::new(9, 9)];
        assert!(Quad::from_polygon(&flat).is_none());
        let diamond = [Point::new(0, 5), Point::new(5, 0), Point::new(10, 5), Point::new(5, 10)];
        assert!(Quad::from_polygon(&diamond).is_some());
    }

    #[test]
    fn rectified_size_uses_longest_edges() {
        let q = Quad::from_corners([(0.0, 0.0), (100.0, 0.0), (0.0, 50.0), (110.0, 52.0)]);
        let (w, h) = q.rectified_size();
        assert_eq!(w, 110);
        assert_eq!(h, 53);
    }

    #[test]
    fn shoelace_area_rectangle() {
        let corners = [(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)];
        let area = shoelace_area(&corners);
        assert!((area - 50.0).abs() < 1e-3, "Expected 50.0, got {}", area);
    }

    #[test]
    fn polygon_area_ignores_winding() {
        let ccw = vec![Point::new(0, 0), Point::new(0, 3), Point::new(4, 3), Point::new(4, 0)];
        let mut cw = ccw.clone();
        cw.reverse();
        assert_eq!(polygon_area(&ccw), 12.0);
        assert_eq!(polygon_area(&cw), 12.0);
        assert_eq!(Contour::new(vec![Point::new(1, 1)]).area(), 0.0);
    }
}
