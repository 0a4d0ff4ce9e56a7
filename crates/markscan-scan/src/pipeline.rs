// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Full image pipeline for one photographed sheet: normalize, locate regions,
// sample every answer block, and identify the student.

use image::DynamicImage;
use markscan_core::config::GraderConfig;
use markscan_core::error::{MarkscanError, Result};
use markscan_core::layout::TemplateLayout;
use markscan_core::ports::StudentDirectory;
use markscan_core::types::{SheetConfiguration, Student};
use tracing::{debug, info, instrument};

use crate::grid::{BubbleGridSampler, MarkDecisionUnit};
use crate::identifier::{IdentifierReader, TextExtractor};
use crate::normalize::SheetNormalizer;
use crate::region::{RegionLocator, RegionWarper};
use crate::vision::VisionEngine;

/// Marked column indices per row, one table per answer block.
pub type BlockMarks = Vec<Vec<usize>>;

/// What the image pipeline extracted from one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedSheet {
    pub student: Student,
    /// Answer blocks left to right.
    pub blocks: Vec<BlockMarks>,
}

/// Drives every image stage with a shared vision engine and text extractor.
pub struct SheetScanner<'a, V: VisionEngine + ?Sized, T: TextExtractor + ?Sized> {
    vision: &'a V,
    text: &'a T,
    config: &'a GraderConfig,
}

impl<'a, V: VisionEngine + ?Sized, T: TextExtractor + ?Sized> SheetScanner<'a, V, T> {
    pub fn new(vision: &'a V, text: &'a T, config: &'a GraderConfig) -> Self {
        Self {
            vision,
            text,
            config,
        }
    }

    /// Run the pipeline. Identification happens before any bubble sampling,
    /// so an unknown student costs no grid work.
    #[instrument(skip_all, fields(quiz = %quiz.id, questions = quiz.question_count))]
    pub fn scan(
        &self,
        image: &DynamicImage,
        quiz: &SheetConfiguration,
        directory: &(impl StudentDirectory + ?Sized),
    ) -> Result<ScannedSheet> {
        let normalized =
            SheetNormalizer::new(self.vision, self.config.normalizer.clone()).normalize(image)?;
        let page = &normalized.image;

        let layout = TemplateLayout::standard(quiz.question_count);
        let regions = RegionLocator::new(
            self.vision,
            &self.config.regions,
            self.config.normalizer.approx_epsilon,
        )
        .locate(page, &layout)?;

        let student = IdentifierReader::new(self.vision, self.text, self.config.regions.identifier_size)
            .identify(page, &regions.identifier, &quiz.id, directory)?;

        let block_rows = quiz.block_sizes();
        if block_rows.len() != regions.answer_blocks.len() {
            return Err(MarkscanError::MalformedSheetInput(format!(
                "quiz expects {} answer blocks, layout located {}",
                block_rows.len(),
                regions.answer_blocks.len()
            )));
        }

        let warper = RegionWarper::new(self.vision);
        let sampler = BubbleGridSampler::from_config(&self.config.marks);
        let decider = MarkDecisionUnit::from_config(&self.config.marks);

        let mut blocks = Vec::with_capacity(block_rows.len());
        for (index, (quad, rows)) in regions.answer_blocks.iter().zip(block_rows).enumerate() {
            let warped = warper.warp(page, quad, self.config.regions.answer_block_size)?;
            let grid = sampler.sample(&warped, rows, quiz.choice_count)?;
            let marks = decider.decide(&grid);
            debug!(
                block = index,
                rows,
                marked_rows = marks.iter().filter(|r| !r.is_empty()).count(),
                "Answer block read"
            );
            blocks.push(marks);
        }

        info!(student = %student.code, blocks = blocks.len(), "Sheet scanned");
        Ok(ScannedSheet { student, blocks })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use image::{GrayImage, Luma};
    use imageproc::point::Point;
    use markscan_core::types::{ChoiceLabelScheme, QuizId};

    use super::*;
    use crate::vision::{Contour, ContourMode, ImageprocVision, Quad};

    /// Page boundary on the first contour call, template rectangles after.
    struct TemplateVision {
        calls: Cell<usize>,
        regions: Vec<Contour>,
    }

    impl VisionEngine for TemplateVision {
        fn detect_edges(&self, gray: &GrayImage) -> GrayImage {
            gray.clone()
        }
        fn find_contours(&self, _b: &GrayImage, mode: ContourMode) -> Vec<Contour> {
            self.calls.set(self.calls.get() + 1);
            match mode {
                ContourMode::All => vec![rect(0, 0, 999, 999)],
                ContourMode::External => self.regions.clone(),
            }
        }
        fn approximate_polygon(&self, c: &Contour, _e: f64) -> Vec<Point<i32>> {
            c.points.clone()
        }
        fn warp_perspective(&self, _i: &GrayImage, q: &Quad, size: (u32, u32)) -> Result<GrayImage> {
            // Ink the first cell of every row inside the answer block.
            let mut out = GrayImage::from_pixel(size.0, size.1, Luma([255u8]));
            if q.top_left == (100.0, 200.0) {
                for y in 0..size.1 {
                    for x in 0..size.0 / 4 {
                        out.put_pixel(x, y, Luma([0u8]));
                    }
                }
            }
            Ok(out)
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

    struct FixedText(&'static str);

    impl TextExtractor for FixedText {
        fn extract_text(&self, _r: &GrayImage) -> Result<String> {
            Ok(self.0.into())
        }
    }

    struct OneStudent(Student);

    impl StudentDirectory for OneStudent {
        fn find_student(&self, _q: &QuizId, code: &str) -> Result<Option<Student>> {
            Ok((code == self.0.code).then(|| self.0.clone()))
        }
    }

    fn quiz(question_count: usize) -> SheetConfiguration {
        SheetConfiguration {
            id: QuizId::new(),
            name: "Physics".into(),
            question_count,
            choice_count: 4,
            label_scheme: ChoiceLabelScheme::Alphabetic,
            fail_mark: 0.0,
            questions: Vec::new(),
        }
    }

    fn directory(quiz: &SheetConfiguration) -> OneStudent {
        OneStudent(Student {
            code: "AB12".into(),
            name: "Grace".into(),
            email: "grace@example.org".into(),
            quiz_id: quiz.id,
        })
    }

    // -- Photographed sheet -------------------------------------------------

    const ANSWER_BLOCK: (f32, f32, f32, f32) = (60.0, 220.0, 540.0, 800.0);
    const ID_BOX: (f32, f32, f32, f32) = (330.0, 40.0, 560.0, 130.0);

    /// An 800x1100 photo of a 600x840 page on a dark table, rotated by
    /// `degrees` about its top-left corner at `origin`. `ink` receives page
    /// coordinates.
    fn photograph(degrees: f32, origin: (f32, f32), ink: impl Fn(f32, f32) -> bool) -> GrayImage {
        let (sin, cos) = degrees.to_radians().sin_cos();
        GrayImage::from_fn(800, 1100, |x, y| {
            let (dx, dy) = (x as f32 - origin.0, y as f32 - origin.1);
            let (u, v) = (dx * cos + dy * sin, dy * cos - dx * sin);
            let value = if !(0.0..600.0).contains(&u) || !(0.0..840.0).contains(&v) {
                40
            } else if ink(u, v) {
                30
            } else {
                230
            };
            Luma([value])
        })
    }

    /// Four-pixel outline of a box.
    fn on_outline(u: f32, v: f32, (x0, y0, x1, y1): (f32, f32, f32, f32)) -> bool {
        let inside = (x0..x1).contains(&u) && (y0..y1).contains(&v);
        let interior = (x0 + 4.0..x1 - 4.0).contains(&u) && (y0 + 4.0..y1 - 4.0).contains(&v);
        inside && !interior
    }

    /// A 60x60 filled square centred in each marked cell of a 5x4 grid
    /// laid over the answer block.
    fn on_mark(u: f32, v: f32, marks: &[&[usize]; 5]) -> bool {
        let (x0, y0, x1, y1) = ANSWER_BLOCK;
        let (cell_w, cell_h) = ((x1 - x0) / 4.0, (y1 - y0) / 5.0);
        let (col, row) = (((u - x0) / cell_w).floor(), ((v - y0) / cell_h).floor());
        if !(0.0..4.0).contains(&col) || !(0.0..5.0).contains(&row) {
            return false;
        }
        let centre_u = x0 + (col + 0.5) * cell_w;
        let centre_v = y0 + (row + 0.5) * cell_h;
        marks[row as usize].contains(&(col as usize))
            && (u - centre_u).abs() < 30.0
            && (v - centre_v).abs() < 30.0
    }

    #[test]
    fn skewed_photo_is_read_with_the_imageproc_engine() {
        let marks: [&[usize]; 5] = [&[0], &[2], &[], &[1, 3], &[3]];
        let photo = photograph(2.0, (100.0, 110.0), |u, v| {
            on_outline(u, v, ANSWER_BLOCK) || on_outline(u, v, ID_BOX) || on_mark(u, v, &marks)
        });
        let quiz = quiz(5);
        let config = GraderConfig::default();
        let vision = ImageprocVision::default();
        let scanner = SheetScanner::new(&vision, &FixedText("AB12"), &config);

        let sheet = scanner
            .scan(&DynamicImage::ImageLuma8(photo), &quiz, &directory(&quiz))
            .unwrap();
        assert_eq!(sheet.student.code, "AB12");
        assert_eq!(
            sheet.blocks,
            vec![vec![vec![0], vec![2], vec![], vec![1, 3], vec![3]]]
        );
    }

    #[test]
    fn single_block_sheet_yields_marks_for_every_row() {
        let vision = TemplateVision {
            calls: Cell::new(0),
            regions: vec![rect(100, 200, 700, 900), rect(600, 50, 900, 150)],
        };
        let quiz = quiz(10);
        let config = GraderConfig::default();
        let scanner = SheetScanner::new(&vision, &FixedText("AB-12"), &config);
        let page = DynamicImage::ImageLuma8(GrayImage::new(1000, 1000));

        let sheet = scanner.scan(&page, &quiz, &directory(&quiz)).unwrap();
        assert_eq!(sheet.student.code, "AB12");
        assert_eq!(sheet.blocks.len(), 1);
        assert_eq!(sheet.blocks[0], vec![vec![0usize]; 10]);
    }

    #[test]
    fn unknown_student_stops_before_sampling() {
        let vision = TemplateVision {
            calls: Cell::new(0),
            regions: vec![rect(100, 200, 700, 900), rect(600, 50, 900, 150)],
        };
        let quiz = quiz(10);
        let config = GraderConfig::default();
        let scanner = SheetScanner::new(&vision, &FixedText("ZZ99"), &config);
        let page = DynamicImage::ImageLuma8(GrayImage::new(1000, 1000));

        let err = scanner.scan(&page, &quiz, &directory(&quiz)).unwrap_err();
        assert!(matches!(err, MarkscanError::StudentNotFound { code } if code == "ZZ99"));
    }

    #[test]
    fn two_block_quiz_needs_three_rectangles() {
        let vision = TemplateVision {
            calls: Cell::new(0),
            regions: vec![rect(100, 200, 700, 900), rect(600, 50, 900, 150)],
        };
        let quiz = quiz(40);
        let config = GraderConfig::default();
        let scanner = SheetScanner::new(&vision, &FixedText("AB12"), &config);
        let page = DynamicImage::ImageLuma8(GrayImage::new(1000, 1000));

        let err = scanner.scan(&page, &quiz, &directory(&quiz)).unwrap_err();
        assert!(matches!(err, MarkscanError::RegionShapeInvalid(_)));
        assert_eq!(vision.calls.get(), 2);
    }
}
