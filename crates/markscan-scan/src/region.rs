// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Region location and rectification. Find the answer blocks and the
// identifier box on a normalized page, and warp each one to a fixed size.

use image::GrayImage;
use markscan_core::config::RegionConfig;
use markscan_core::error::{MarkscanError, Result};
use markscan_core::layout::{HorizontalSlot, RegionRole, TemplateLayout};
use tracing::{debug, instrument};

use crate::vision::{ContourMode, Quad, VisionEngine};

/// A qualifying rectangle on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub quad: Quad,
    /// Area enclosed by the traced contour.
    pub area: f64,
}

/// Regions assigned to their template roles.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedRegions {
    /// Answer blocks, left to right.
    pub answer_blocks: Vec<Quad>,
    pub identifier: Quad,
}

/// Finds rectangles on a page and assigns them roles from a [`TemplateLayout`].
pub struct RegionLocator<'a, V: VisionEngine + ?Sized> {
    vision: &'a V,
    min_area: f64,
    approx_epsilon: f64,
}

impl<'a, V: VisionEngine + ?Sized> RegionLocator<'a, V> {
    pub fn new(vision: &'a V, config: &RegionConfig, approx_epsilon: f64) -> Self {
        Self {
            vision,
            min_area: config.min_area,
            approx_epsilon,
        }
    }

    /// Outer contours above the noise floor whose approximation has exactly
    /// four vertices, largest first.
    pub fn rectangles(&self, page: &GrayImage) -> Vec<Rectangle> {
        let edges = self.vision.detect_edges(page);
        let mut found: Vec<Rectangle> = self
            .vision
            .find_contours(&edges, ContourMode::External)
            .iter()
            .filter_map(|contour| {
                let area = contour.area();
                if area <= self.min_area {
                    return None;
                }
                let vertices = self.vision.approximate_polygon(contour, self.approx_epsilon);
                Quad::from_polygon(&vertices).map(|quad| Rectangle { quad, area })
            })
            .collect();
        found.sort_by(|a, b| b.area.total_cmp(&a.area));
        found
    }

    /// Assign page rectangles to the roles of `layout` and validate them.
    #[instrument(skip_all, fields(width = page.width(), height = page.height()))]
    pub fn locate(&self, page: &GrayImage, layout: &TemplateLayout) -> Result<LocatedRegions> {
        let rects = self.rectangles(page);
        let required = layout.required_rectangles();
        debug!(found = rects.len(), required, "Rectangles on page");
        if rects.len() < required {
            return Err(MarkscanError::RegionShapeInvalid(format!(
                "expected at least {required} rectangles, found {}",
                rects.len()
            )));
        }

        let page_area = page.width() as f64 * page.height() as f64;
        let mut blocks: Vec<(usize, Quad, HorizontalSlot)> = Vec::new();
        let mut identifier = None;

        for spec in &layout.regions {
            let rect = rects[spec.area_rank];
            let fraction = if page_area > 0.0 { rect.area / page_area } else { 0.0 };
            if fraction < spec.min_area_fraction || fraction > spec.max_area_fraction {
                return Err(MarkscanError::RegionShapeInvalid(format!(
                    "{:?} covers {:.3} of the page, expected {:.3}..={:.3}",
                    spec.role, fraction, spec.min_area_fraction, spec.max_area_fraction
                )));
            }
            match spec.role {
                RegionRole::AnswerBlock(index) => blocks.push((index, rect.quad, spec.slot)),
                RegionRole::Identifier => identifier = Some(rect.quad),
            }
        }

        check_slots(&blocks)?;
        blocks.sort_by_key(|(index, _, _)| *index);

        let identifier = identifier.ok_or_else(|| {
            MarkscanError::RegionShapeInvalid("layout has no identifier region".into())
        })?;
        if blocks.is_empty() {
            return Err(MarkscanError::RegionShapeInvalid(
                "layout has no answer block".into(),
            ));
        }

        Ok(LocatedRegions {
            answer_blocks: blocks.into_iter().map(|(_, quad, _)| quad).collect(),
            identifier,
        })
    }
}

/// Every left-slot block must sit left of every right-slot block.
fn check_slots(blocks: &[(usize, Quad, HorizontalSlot)]) -> Result<()> {
    let centre_x = |slot: HorizontalSlot| {
        blocks
            .iter()
            .filter(move |(_, _, s)| *s == slot)
            .map(|(_, q, _)| q.centroid().0)
    };
    let rightmost_left = centre_x(HorizontalSlot::Left).fold(f32::NEG_INFINITY, f32::max);
    let leftmost_right = centre_x(HorizontalSlot::Right).fold(f32::INFINITY, f32::min);
    if rightmost_left >= leftmost_right {
        return Err(MarkscanError::RegionShapeInvalid(format!(
            "left answer block (x={rightmost_left:.1}) is not left of right block (x={leftmost_right:.1})"
        )));
    }
    Ok(())
}

/// Perspective-warps an ordered quad onto a fixed rectangle.
pub struct RegionWarper<'a, V: VisionEngine + ?Sized> {
    vision: &'a V,
}

impl<'a, V: VisionEngine + ?Sized> RegionWarper<'a, V> {
    pub fn new(vision: &'a V) -> Self {
        Self { vision }
    }

    /// Warp `quad` on `page` to exactly `size`, whatever the source skew.
    pub fn warp(&self, page: &GrayImage, quad: &Quad, size: (u32, u32)) -> Result<GrayImage> {
        let out = self.vision.warp_perspective(page, quad, size)?;
        if out.dimensions() != size {
            return Err(MarkscanError::MalformedSheetInput(format!(
                "warp produced {:?}, expected {size:?}",
                out.dimensions()
            )));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use image::Luma;
    use imageproc::point::Point;

    use super::*;
    use crate::vision::{Contour, ImageprocVision};

    struct FixedContours(Vec<Contour>);

    impl VisionEngine for FixedContours {
        fn detect_edges(&self, gray: &GrayImage) -> GrayImage {
            gray.clone()
        }
        fn find_contours(&self, _b: &GrayImage, _m: ContourMode) -> Vec<Contour> {
            self.0.clone()
        }
        fn approximate_polygon(&self, c: &Contour, _e: f64) -> Vec<Point<i32>> {
            c.points.clone()
        }
        fn warp_perspective(&self, _i: &GrayImage, _q: &Quad, size: (u32, u32)) -> Result<GrayImage> {
            Ok(GrayImage::new(size.0, size.1))
        }
        fn adaptive_threshold(&self, g: &GrayImage, _r: u32, _o: i32) -> GrayImage {
            g.clone()
        }
    }

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Contour {
        Contour::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    fn page() -> GrayImage {
        GrayImage::new(1000, 1000)
    }

    #[test]
    fn single_block_sheet_uses_two_largest() {
        let vision = FixedContours(vec![
            rect(600, 50, 900, 150),  // identifier, 30_000
            rect(100, 200, 700, 900), // block, 420_000
            rect(0, 0, 5, 5),         // noise
            Contour::new(vec![Point::new(0, 0), Point::new(500, 0), Point::new(0, 500)]),
        ]);
        let locator = RegionLocator::new(&vision, &RegionConfig::default(), 0.02);
        let regions = locator.locate(&page(), &TemplateLayout::standard(20)).unwrap();

        assert_eq!(regions.answer_blocks.len(), 1);
        assert_eq!(regions.answer_blocks[0].top_left, (100.0, 200.0));
        assert_eq!(regions.identifier.top_left, (600.0, 50.0));
    }

    #[test]
    fn two_block_sheet_puts_second_largest_on_the_left() {
        let vision = FixedContours(vec![
            rect(520, 200, 920, 950), // right, largest
            rect(80, 200, 470, 940),  // left
            rect(600, 40, 900, 140),  // identifier
        ]);
        let locator = RegionLocator::new(&vision, &RegionConfig::default(), 0.02);
        let regions = locator.locate(&page(), &TemplateLayout::standard(40)).unwrap();

        assert_eq!(regions.answer_blocks[0].top_left, (80.0, 200.0));
        assert_eq!(regions.answer_blocks[1].top_left, (520.0, 200.0));
        assert_eq!(regions.identifier.top_left, (600.0, 40.0));
    }

    #[test]
    fn swapped_blocks_violate_the_layout() {
        let vision = FixedContours(vec![
            rect(80, 200, 480, 950),  // largest but on the left
            rect(520, 200, 910, 940),
            rect(600, 40, 900, 140),
        ]);
        let locator = RegionLocator::new(&vision, &RegionConfig::default(), 0.02);
        let err = locator.locate(&page(), &TemplateLayout::standard(40)).unwrap_err();
        assert!(matches!(err, MarkscanError::RegionShapeInvalid(_)));
    }

    #[test]
    fn too_few_rectangles_is_region_shape_invalid() {
        let vision = FixedContours(vec![rect(100, 200, 700, 900), rect(600, 50, 900, 150)]);
        let locator = RegionLocator::new(&vision, &RegionConfig::default(), 0.02);
        let err = locator.locate(&page(), &TemplateLayout::standard(30)).unwrap_err();
        assert!(matches!(err, MarkscanError::RegionShapeInvalid(_)));
    }

    #[test]
    fn warper_outputs_requested_size_regardless_of_skew() {
        let mut img = GrayImage::from_pixel(300, 300, Luma([255u8]));
        for y in 0..300 {
            for x in 0..300 {
                if (x + y) % 7 == 0 {
                    img.put_pixel(x, y, Luma([0u8]));
                }
            }
        }
        let vision = ImageprocVision::default();
        let warper = RegionWarper::new(&vision);
        let skewed = Quad::from_corners([(30.0, 40.0), (250.0, 20.0), (20.0, 280.0), (270.0, 260.0)]);
        let out = warper.warp(&img, &skewed, (70, 90)).unwrap();
        assert_eq!(out.dimensions(), (70, 90));
    }
}
