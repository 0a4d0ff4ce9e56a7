// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-sheet outcomes and batch reports, and the hand-off of graded sheets to
// the grading ledger.

use std::collections::BTreeMap;

use chrono::Utc;
use markscan_core::error::{ErrorKind, MarkscanError, Result};
use markscan_core::ports::GradingLedger;
use markscan_core::types::{
    GradingSession, ImageId, QuizId, SheetConfiguration, SheetImage, SheetRecord, SheetResult,
    Student, StudentQuestionResult,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{QuestionSummary, SheetGrade};

/// Structured result of one graded sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetOutcome {
    pub image_id: ImageId,
    pub student_code: String,
    pub session: GradingSession,
    /// Name of the quiz the sheet belongs to.
    pub sheet_name: String,
    /// 1-based position of the sheet within its batch.
    pub sheet_number: usize,
    pub score: f64,
    pub total: f64,
    /// Per-question summary keyed by 0-based grid row.
    pub summary: BTreeMap<usize, QuestionSummary>,
}

/// A sheet (or quiz) that could not be graded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetFailure {
    /// None when the failure concerns the whole quiz.
    pub image_id: Option<ImageId>,
    pub kind: ErrorKind,
    pub message: String,
}

impl SheetFailure {
    pub fn new(image_id: Option<ImageId>, err: &MarkscanError) -> Self {
        Self {
            image_id,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcomes and failures of one quiz within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizBatchReport {
    pub quiz_id: QuizId,
    pub sheet_name: String,
    /// None when nothing was pending or the quiz failed before reserving.
    pub session: Option<GradingSession>,
    pub outcomes: Vec<SheetOutcome>,
    pub errors: Vec<SheetFailure>,
}

impl QuizBatchReport {
    pub fn new(quiz: &SheetConfiguration) -> Self {
        Self {
            quiz_id: quiz.id,
            sheet_name: quiz.name.clone(),
            session: None,
            outcomes: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Report of a whole batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub quizzes: Vec<QuizBatchReport>,
}

impl BatchReport {
    pub fn graded(&self) -> usize {
        self.quizzes.iter().map(|q| q.outcomes.len()).sum()
    }

    pub fn failed(&self) -> usize {
        self.quizzes.iter().map(|q| q.errors.len()).sum()
    }
}

/// Builds persistence records and outcomes for graded sheets and hands them
/// to the ledger.
pub struct ResultAccumulator<'a, L: GradingLedger + ?Sized> {
    ledger: &'a L,
}

impl<'a, L: GradingLedger + ?Sized> ResultAccumulator<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }

    /// Persist one graded sheet. Nothing is returned unless the ledger
    /// committed every row.
    pub fn commit(
        &self,
        quiz: &SheetConfiguration,
        image: &SheetImage,
        student: &Student,
        session: GradingSession,
        sheet_number: usize,
        grade: SheetGrade,
    ) -> Result<SheetOutcome> {
        let (record, outcome) = package(quiz, image, student, session, sheet_number, grade);
        self.ledger.commit_sheet(image, &record)?;
        info!(
            image = %image.id,
            student = %student.code,
            session = %session,
            score = outcome.score,
            total = outcome.total,
            "Sheet result recorded"
        );
        Ok(outcome)
    }
}

/// Split a sheet grade into its storage record and its reported outcome.
pub fn package(
    quiz: &SheetConfiguration,
    image: &SheetImage,
    student: &Student,
    session: GradingSession,
    sheet_number: usize,
    grade: SheetGrade,
) -> (SheetRecord, SheetOutcome) {
    let questions = grade
        .questions
        .iter()
        .map(|q| StudentQuestionResult {
            student_code: student.code.clone(),
            question_ordinal: q.ordinal,
            session,
            correct_choices: q.correct_choices.clone(),
            wrong_choices: q.wrong_choices.clone(),
            percentage_pass: q.percentage_pass,
            mark: q.mark,
        })
        .collect();

    let record = SheetRecord {
        result: SheetResult {
            quiz_id: quiz.id,
            image_id: image.id,
            student_code: student.code.clone(),
            session,
            score: grade.score,
            total: grade.total,
            graded_at: Utc::now(),
        },
        questions,
    };

    let outcome = SheetOutcome {
        image_id: image.id,
        student_code: student.code.clone(),
        session,
        sheet_name: quiz.name.clone(),
        sheet_number,
        score: grade.score,
        total: grade.total,
        summary: grade.questions.into_iter().map(|q| (q.row, q)).collect(),
    };

    (record, outcome)
}
