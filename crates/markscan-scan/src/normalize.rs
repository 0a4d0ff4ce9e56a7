// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sheet normalization. Find the page boundary in a raw photo, rectify it to
// a top-down view, and binarize it to flatten uneven lighting.

use std::collections::BTreeSet;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use markscan_core::config::NormalizerConfig;
use markscan_core::error::{MarkscanError, Result};
use tracing::{debug, info, instrument};

use crate::vision::{ContourMode, Quad, VisionEngine};

/// A rectified, binarized page.
#[derive(Debug, Clone)]
pub struct NormalizedSheet {
    /// Top-down page, ink 0 and paper 255.
    pub image: GrayImage,
    /// Page corners in the original photo's coordinates.
    pub boundary: Quad,
}

/// Locates the outer page boundary and perspective-corrects it.
pub struct SheetNormalizer<'a, V: VisionEngine + ?Sized> {
    vision: &'a V,
    config: NormalizerConfig,
}

impl<'a, V: VisionEngine + ?Sized> SheetNormalizer<'a, V> {
    pub fn new(vision: &'a V, config: NormalizerConfig) -> Self {
        Self { vision, config }
    }

    /// Run the normalization pipeline:
    ///
    /// 1. Convert to grayscale and downsample to `max_height`
    /// 2. Edge detection
    /// 3. Rank all contours by enclosed area, keep the top `candidate_count`
    /// 4. Accept the first candidate whose approximation has four vertices
    /// 5. Warp the original-resolution photo onto that quadrilateral
    /// 6. Adaptive threshold
    /// 7. Whiten ink connected to the page edge
    ///
    /// Fails with `BoundaryNotFound` when no ranked candidate is a
    /// quadrilateral; there is no fallback boundary.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn normalize(&self, image: &DynamicImage) -> Result<NormalizedSheet> {
        let gray = image.to_luma8();
        let (orig_w, orig_h) = gray.dimensions();
        if orig_w == 0 || orig_h == 0 {
            return Err(MarkscanError::MalformedSheetInput("empty image".into()));
        }

        let (small, ratio) = downsample(&gray, self.config.max_height);
        debug!(
            width = small.width(),
            height = small.height(),
            ratio,
            "Downsampled for boundary search"
        );

        let boundary = self.find_boundary(&small)?.scaled(ratio);
        debug!(
            top_left = ?boundary.top_left,
            top_right = ?boundary.top_right,
            bottom_left = ?boundary.bottom_left,
            bottom_right = ?boundary.bottom_right,
            "Page boundary found"
        );

        let size = boundary.rectified_size();
        let warped = self.vision.warp_perspective(&gray, &boundary, size)?;
        let mut binary = self.vision.adaptive_threshold(
            &warped,
            self.config.threshold_block_radius,
            self.config.threshold_offset,
        );
        let cleared = clear_border_ink(&mut binary);

        info!(out_w = size.0, out_h = size.1, cleared, "Sheet normalized");
        Ok(NormalizedSheet {
            image: binary,
            boundary,
        })
    }

    /// Pick the page quadrilateral from a (downsampled) grayscale photo.
    fn find_boundary(&self, gray: &GrayImage) -> Result<Quad> {
        let edges = self.vision.detect_edges(gray);
        let mut ranked: Vec<_> = self
            .vision
            .find_contours(&edges, ContourMode::All)
            .into_iter()
            .map(|c| (c.area(), c))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.truncate(self.config.candidate_count);

        for (rank, (area, contour)) in ranked.iter().enumerate() {
            let vertices = self
                .vision
                .approximate_polygon(contour, self.config.approx_epsilon);
            debug!(rank, area, vertices = vertices.len(), "Boundary candidate");
            if let Some(quad) = Quad::from_polygon(&vertices) {
                return Ok(quad);
            }
        }

        Err(MarkscanError::BoundaryNotFound {
            candidates: ranked.len(),
        })
    }
}

/// Whiten every ink component touching the image edge and return how many
/// pixels changed. The boundary sits slightly outside the paper, so the warp
/// can leave a frame of table along the border that would enclose every
/// printed region.
fn clear_border_ink(page: &mut GrayImage) -> usize {
    let paper = Luma([255u8]);
    let labels = connected_components(&*page, Connectivity::Eight, paper);
    let (w, h) = labels.dimensions();
    if w == 0 || h == 0 {
        return 0;
    }
    let on_edge: BTreeSet<u32> = (0..w)
        .flat_map(|x| [(x, 0), (x, h - 1)])
        .chain((0..h).flat_map(|y| [(0, y), (w - 1, y)]))
        .map(|(x, y)| labels.get_pixel(x, y).0[0])
        .filter(|&label| label != 0)
        .collect();
    if on_edge.is_empty() {
        return 0;
    }

    let mut cleared = 0;
    for (x, y, pixel) in page.enumerate_pixels_mut() {
        if on_edge.contains(&labels.get_pixel(x, y).0[0]) {
            *pixel = paper;
            cleared += 1;
        }
    }
    cleared
}

/// Shrink `gray` to at most `max_height` rows. Returns the image and the
/// factor mapping its coordinates back to the original.
fn downsample(gray: &GrayImage, max_height: u32) -> (GrayImage, f32) {
    let (w, h) = gray.dimensions();
    if h <= max_height {
        return (gray.clone(), 1.0);
    }
    let ratio = h as f32 / max_height as f32;
    let new_w = ((w as f32 / ratio).round() as u32).max(1);
    (imageops::resize(gray, new_w, max_height, FilterType::Triangle), ratio)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use image::Luma;
    use imageproc::point::Point;

    use super::*;
    use crate::vision::{Contour, ImageprocVision};

    /// Vision engine that returns scripted contours and records warps.
    struct ScriptedVision {
        contours: Vec<Contour>,
        warps: Cell<usize>,
    }

    impl VisionEngine for ScriptedVision {
        fn detect_edges(&self, gray: &GrayImage) -> GrayImage {
            gray.clone()
        }
        fn find_contours(&self, _binary: &GrayImage, _mode: ContourMode) -> Vec<Contour> {
            self.contours.clone()
        }
        fn approximate_polygon(&self, contour: &Contour, _eps: f64) -> Vec<Point<i32>> {
            contour.points.clone()
        }
        fn warp_perspective(&self, _img: &GrayImage, _q: &Quad, size: (u32, u32)) -> Result<GrayImage> {
            self.warps.set(self.warps.get() + 1);
            Ok(GrayImage::new(size.0, size.1))
        }
        fn adaptive_threshold(&self, gray: &GrayImage, _r: u32, _o: i32) -> GrayImage {
            gray.clone()
        }
    }

    fn poly(pts: &[(i32, i32)]) -> Contour {
        Contour::new(pts.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    #[test]
    fn no_quadrilateral_among_candidates_is_boundary_not_found() {
        let vision = ScriptedVision {
            contours: vec![
                poly(&[(0, 0), (90, 0), (45, 80)]),
                poly(&[(0, 0), (60, 0), (70, 30), (30, 60), (0, 30)]),
                poly(&[(5, 5), (20, 5), (12, 20)]),
            ],
            warps: Cell::new(0),
        };
        let normalizer = SheetNormalizer::new(&vision, NormalizerConfig::default());
        let img = DynamicImage::ImageLuma8(GrayImage::new(100, 100));

        let err = normalizer.normalize(&img).unwrap_err();
        assert!(matches!(err, MarkscanError::BoundaryNotFound { candidates: 3 }));
        assert_eq!(vision.warps.get(), 0, "no warp after a failed search");
    }

    #[test]
    fn quadrilateral_outside_top_k_is_ignored() {
        let mut contours: Vec<Contour> = (0..5)
            .map(|i| {
                let s = 90 - i * 5;
                poly(&[(0, 0), (s, 0), (s / 2, s)])
            })
            .collect();
        contours.push(poly(&[(0, 0), (10, 0), (10, 10), (0, 10)]));
        let vision = ScriptedVision {
            contours,
            warps: Cell::new(0),
        };
        let normalizer = SheetNormalizer::new(&vision, NormalizerConfig::default());
        let img = DynamicImage::ImageLuma8(GrayImage::new(100, 100));
        assert!(matches!(
            normalizer.normalize(&img),
            Err(MarkscanError::BoundaryNotFound { candidates: 5 })
        ));
    }

    #[test]
    fn first_ranked_quadrilateral_wins_and_is_scaled_back() {
        let vision = ScriptedVision {
            contours: vec![
                // largest, but a triangle
                poly(&[(0, 0), (240, 0), (120, 250)]),
                poly(&[(20, 10), (120, 12), (125, 140), (15, 135)]),
                poly(&[(40, 40), (60, 40), (60, 60), (40, 60)]),
            ],
            warps: Cell::new(0),
        };
        let config = NormalizerConfig {
            max_height: 250,
            ..NormalizerConfig::default()
        };
        let normalizer = SheetNormalizer::new(&vision, config);
        let img = DynamicImage::ImageLuma8(GrayImage::new(400, 500));

        let sheet = normalizer.normalize(&img).unwrap();
        assert_eq!(sheet.boundary.top_left, (40.0, 20.0));
        assert_eq!(sheet.boundary.bottom_right, (250.0, 280.0));
        assert_eq!(vision.warps.get(), 1);
    }

    #[test]
    fn ink_touching_the_edge_is_cleared() {
        let mut page = GrayImage::from_pixel(60, 40, Luma([255u8]));
        // table sliver along the left and top edges
        for y in 0..40 {
            for x in 0..3 {
                page.put_pixel(x, y, Luma([0u8]));
            }
        }
        for x in 0..60 {
            page.put_pixel(x, 0, Luma([0u8]));
        }
        // printed box well inside the page
        for y in 10..30 {
            for x in 20..40 {
                if !(12..28).contains(&y) || !(22..38).contains(&x) {
                    page.put_pixel(x, y, Luma([0u8]));
                }
            }
        }

        let cleared = clear_border_ink(&mut page);
        assert_eq!(cleared, 40 * 3 + 57);
        assert_eq!(page.get_pixel(1, 20).0[0], 255);
        assert_eq!(page.get_pixel(30, 0).0[0], 255);
        assert_eq!(page.get_pixel(20, 10).0[0], 0);
        assert_eq!(page.get_pixel(30, 20).0[0], 255);
        assert_eq!(clear_border_ink(&mut page), 0);
    }

    #[test]
    fn blank_photo_fails_without_panicking() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 300, Luma([200u8])));
        let vision = ImageprocVision::default();
        let normalizer = SheetNormalizer::new(&vision, NormalizerConfig::default());
        assert!(matches!(
            normalizer.normalize(&img),
            Err(MarkscanError::BoundaryNotFound { candidates: 0 })
        ));
    }

    #[test]
    fn synthetic_page_is_found_and_rectified() {
        let (w, h) = (400u32, 500u32);
        let mut img = GrayImage::from_pixel(w, h, Luma([30u8]));
        for y in 60..440 {
            for x in 50..350 {
                img.put_pixel(x, y, Luma([240u8]));
            }
        }
        let vision = ImageprocVision::default();
        let normalizer = SheetNormalizer::new(&vision, NormalizerConfig::default());
        let sheet = normalizer.normalize(&DynamicImage::ImageLuma8(img)).unwrap();

        let (out_w, out_h) = sheet.image.dimensions();
        assert!((280..=320).contains(&out_w), "width {out_w}");
        assert!((360..=400).contains(&out_h), "height {out_h}");
    }
}
