// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sheet correction orchestration.
//
// Single-sheet mode propagates any failure to the caller and writes nothing
// for that sheet. Batch mode reserves one session per quiz, grades every
// pending image, and collects per-image failures without stopping.

use std::path::Path;

use image::DynamicImage;
use markscan_core::config::GraderConfig;
use markscan_core::error::{MarkscanError, Result};
use markscan_core::ports::{GradingLedger, StudentDirectory};
use markscan_core::types::{ImageStatus, SheetConfiguration, SheetImage, Student};
use markscan_scan::{SheetScanner, TextExtractor, VisionEngine};
use tracing::{info, instrument, warn};

use crate::accumulator::{BatchReport, QuizBatchReport, ResultAccumulator, SheetFailure, SheetOutcome};
use crate::engine::{GradingEngine, SheetGrade};
use crate::scoring::policy_for;

/// Grades uploaded sheet images and records the results.
pub struct SheetCorrector<'a, V, T, S>
where
    V: VisionEngine + ?Sized,
    T: TextExtractor + ?Sized,
    S: StudentDirectory + GradingLedger + ?Sized,
{
    vision: &'a V,
    text: &'a T,
    store: &'a S,
    config: &'a GraderConfig,
}

impl<'a, V, T, S> SheetCorrector<'a, V, T, S>
where
    V: VisionEngine + ?Sized,
    T: TextExtractor + ?Sized,
    S: StudentDirectory + GradingLedger + ?Sized,
{
    pub fn new(vision: &'a V, text: &'a T, store: &'a S, config: &'a GraderConfig) -> Self {
        Self {
            vision,
            text,
            store,
            config,
        }
    }

    /// Grade one pending image.
    ///
    /// The session is reserved only after the image has been fully read and
    /// graded, and released again if the commit fails, so a failed attempt
    /// leaves no session behind.
    #[instrument(skip_all, fields(quiz = %quiz.id, image = %image.id))]
    pub fn correct_single(
        &self,
        quiz: &SheetConfiguration,
        image: &SheetImage,
    ) -> Result<SheetOutcome> {
        let engine = GradingEngine::new(quiz, policy_for(self.config.scoring))?;
        check_pending(quiz, image)?;

        let (student, grade) = self.grade_image(quiz, &engine, image)?;
        let session = self.store.reserve_session(&quiz.id)?;
        let committed =
            ResultAccumulator::new(self.store).commit(quiz, image, &student, session, 1, grade);
        if committed.is_err() {
            if let Err(err) = self.store.release_session(&quiz.id, session) {
                warn!(session = %session, error = %err, "Unused session could not be released");
            }
        }
        committed
    }

    /// Grade every pending image of every quiz.
    #[instrument(skip_all, fields(quizzes = quizzes.len()))]
    pub fn correct_batch(&self, quizzes: &[SheetConfiguration]) -> BatchReport {
        let mut report = BatchReport::default();
        for quiz in quizzes {
            report.quizzes.push(self.correct_quiz(quiz));
        }
        info!(
            graded = report.graded(),
            failed = report.failed(),
            "Batch correction finished"
        );
        report
    }

    fn correct_quiz(&self, quiz: &SheetConfiguration) -> QuizBatchReport {
        let mut report = QuizBatchReport::new(quiz);

        let engine = match GradingEngine::new(quiz, policy_for(self.config.scoring)) {
            Ok(engine) => engine,
            Err(err) => {
                warn!(quiz = %quiz.id, error = %err, "Quiz configuration rejected");
                report.errors.push(SheetFailure::new(None, &err));
                return report;
            }
        };

        let pending = match self.store.pending_images(&quiz.id) {
            Ok(pending) => pending,
            Err(err) => {
                report.errors.push(SheetFailure::new(None, &err));
                return report;
            }
        };
        if pending.is_empty() {
            info!(quiz = %quiz.id, "No pending sheets");
            return report;
        }

        // One reservation for the whole batch of this quiz.
        let session = match self.store.reserve_session(&quiz.id) {
            Ok(session) => session,
            Err(err) => {
                report.errors.push(SheetFailure::new(None, &err));
                return report;
            }
        };
        report.session = Some(session);
        info!(quiz = %quiz.id, session = %session, sheets = pending.len(), "Correcting quiz");

        let accumulator = ResultAccumulator::new(self.store);
        for (index, image) in pending.iter().enumerate() {
            let result = self
                .grade_image(quiz, &engine, image)
                .and_then(|(student, grade)| {
                    accumulator.commit(quiz, image, &student, session, index + 1, grade)
                });
            match result {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(err) => {
                    warn!(image = %image.id, kind = ?err.kind(), error = %err, "Sheet failed");
                    report.errors.push(SheetFailure::new(Some(image.id), &err));
                }
            }
        }
        report
    }

    fn grade_image(
        &self,
        quiz: &SheetConfiguration,
        engine: &GradingEngine<'_>,
        image: &SheetImage,
    ) -> Result<(Student, SheetGrade)> {
        let photo = load_photo(&image.path)?;
        let scanned = SheetScanner::new(self.vision, self.text, self.config).scan(
            &photo,
            quiz,
            self.store,
        )?;
        let grade = engine.grade_sheet(&scanned.blocks)?;
        Ok((scanned.student, grade))
    }
}

fn check_pending(quiz: &SheetConfiguration, image: &SheetImage) -> Result<()> {
    if image.quiz_id != quiz.id {
        return Err(MarkscanError::MalformedSheetInput(format!(
            "image {} belongs to quiz {}, not {}",
            image.id, image.quiz_id, quiz.id
        )));
    }
    if image.status != ImageStatus::Pending {
        return Err(MarkscanError::MalformedSheetInput(format!(
            "image {} is already {}",
            image.id,
            image.status.as_str()
        )));
    }
    Ok(())
}

fn load_photo(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| {
        MarkscanError::MalformedSheetInput(format!("cannot read {}: {e}", path.display()))
    })
}
