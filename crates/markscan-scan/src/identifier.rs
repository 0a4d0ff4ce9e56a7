// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reads the student code box and resolves the student it names.

use image::GrayImage;
use markscan_core::error::{MarkscanError, Result};
use markscan_core::ports::StudentDirectory;
use markscan_core::types::{QuizId, Student};
use tracing::{debug, info, instrument};

use crate::region::RegionWarper;
use crate::vision::{Quad, VisionEngine};

/// Capability that turns an image region into raw text.
pub trait TextExtractor {
    fn extract_text(&self, region: &GrayImage) -> Result<String>;
}

/// Text extractor for builds without OCR support.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableTextExtractor;

impl TextExtractor for UnavailableTextExtractor {
    fn extract_text(&self, _region: &GrayImage) -> Result<String> {
        Err(MarkscanError::CapabilityUnavailable)
    }
}

/// Keep only alphanumeric characters of raw extracted text.
pub fn clean_code(raw: &str) -> String {
    raw.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Reads the identifier region and looks the student up.
///
/// A misread that happens to match another enrolled code is not detected.
pub struct IdentifierReader<'a, V: VisionEngine + ?Sized, T: TextExtractor + ?Sized> {
    warper: RegionWarper<'a, V>,
    extractor: &'a T,
    size: (u32, u32),
}

impl<'a, V: VisionEngine + ?Sized, T: TextExtractor + ?Sized> IdentifierReader<'a, V, T> {
    pub fn new(vision: &'a V, extractor: &'a T, size: (u32, u32)) -> Self {
        Self {
            warper: RegionWarper::new(vision),
            extractor,
            size,
        }
    }

    /// Warp the identifier box to its canonical size and return the cleaned code.
    pub fn read_code(&self, page: &GrayImage, region: &Quad) -> Result<String> {
        let warped = self.warper.warp(page, region, self.size)?;
        let raw = self.extractor.extract_text(&warped)?;
        let code = clean_code(&raw);
        debug!(raw = %raw.trim(), code = %code, "Identifier text extracted");
        Ok(code)
    }

    /// Read the code and resolve it within `quiz`.
    #[instrument(skip_all, fields(quiz = %quiz))]
    pub fn identify(
        &self,
        page: &GrayImage,
        region: &Quad,
        quiz: &QuizId,
        directory: &(impl StudentDirectory + ?Sized),
    ) -> Result<Student> {
        let code = self.read_code(page, region)?;
        if code.is_empty() {
            return Err(MarkscanError::StudentNotFound { code });
        }
        let student = directory
            .find_student(quiz, &code)?
            .ok_or_else(|| MarkscanError::StudentNotFound { code: code.clone() })?;
        info!(student = %student.code, "Student identified");
        Ok(student)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::vision::ImageprocVision;

    struct ScriptedText(&'static str);

    impl TextExtractor for ScriptedText {
        fn extract_text(&self, region: &GrayImage) -> Result<String> {
            assert_eq!(region.dimensions(), (300, 100));
            Ok(self.0.to_string())
        }
    }

    struct Directory(HashMap<String, Student>);

    impl StudentDirectory for Directory {
        fn find_student(&self, _quiz: &QuizId, code: &str) -> Result<Option<Student>> {
            Ok(self.0.get(code).cloned())
        }
    }

    fn directory(quiz: QuizId) -> Directory {
        let student = Student {
            code: "S1024".into(),
            name: "Ada".into(),
            email: "ada@example.org".into(),
            quiz_id: quiz,
        };
        Directory(HashMap::from([(student.code.clone(), student)]))
    }

    fn region() -> Quad {
        Quad::from_corners([(10.0, 10.0), (310.0, 10.0), (10.0, 110.0), (310.0, 110.0)])
    }

    #[test]
    fn clean_code_strips_punctuation_and_whitespace() {
        assert_eq!(clean_code(" S-10.24 \n"), "S1024");
        assert_eq!(clean_code("|_|"), "");
    }

    #[test]
    fn identifies_known_student() {
        let quiz = QuizId::new();
        let vision = ImageprocVision::default();
        let text = ScriptedText("S 1024!");
        let reader = IdentifierReader::new(&vision, &text, (300, 100));
        let page = GrayImage::new(400, 200);

        let student = reader.identify(&page, &region(), &quiz, &directory(quiz)).unwrap();
        assert_eq!(student.code, "S1024");
    }

    #[test]
    fn unknown_or_blank_code_is_student_not_found() {
        let quiz = QuizId::new();
        let vision = ImageprocVision::default();
        let page = GrayImage::new(400, 200);

        for raw in ["S9999", " .. "] {
            let text = ScriptedText(raw);
            let reader = IdentifierReader::new(&vision, &text, (300, 100));
            let err = reader.identify(&page, &region(), &quiz, &directory(quiz)).unwrap_err();
            assert!(matches!(err, MarkscanError::StudentNotFound { .. }), "{raw:?}: {err}");
        }
    }

    #[test]
    fn missing_extractor_reports_capability() {
        let vision = ImageprocVision::default();
        let reader = IdentifierReader::new(&vision, &UnavailableTextExtractor, (300, 100));
        let err = reader.read_code(&GrayImage::new(400, 200), &region()).unwrap_err();
        assert!(matches!(err, MarkscanError::CapabilityUnavailable));
    }
}
