// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Grading engine — turns marked column indices into per-question and
// per-sheet scores under a scoring policy.

use markscan_core::error::{MarkscanError, Result};
use markscan_core::types::{ChoiceLabelScheme, Question, SheetConfiguration};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::mapping::RowMapping;
use crate::scoring::ScoringPolicy;

/// Outcome of one question row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSummary {
    /// Grid row across all blocks, 0-based.
    pub row: usize,
    pub ordinal: usize,
    pub correct_choices: Vec<String>,
    pub wrong_choices: Vec<String>,
    pub percentage_pass: f64,
    pub mark: f64,
}

/// Scores for a whole sheet, one summary per question in row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetGrade {
    pub score: f64,
    pub total: f64,
    pub questions: Vec<QuestionSummary>,
}

/// Grades sheets of one quiz.
pub struct GradingEngine<'a> {
    quiz: &'a SheetConfiguration,
    mapping: RowMapping,
    policy: Box<dyn ScoringPolicy>,
}

impl<'a> GradingEngine<'a> {
    /// Validates the quiz's row mapping up front.
    pub fn new(quiz: &'a SheetConfiguration, policy: Box<dyn ScoringPolicy>) -> Result<Self> {
        let mapping = RowMapping::build(quiz)?;
        Ok(Self {
            quiz,
            mapping,
            policy,
        })
    }

    pub fn mapping(&self) -> &RowMapping {
        &self.mapping
    }

    /// Grade every row of every block. `blocks[b][r]` holds the marked
    /// columns of row `r` in block `b`.
    #[instrument(skip_all, fields(quiz = %self.quiz.id, policy = self.policy.name()))]
    pub fn grade_sheet(&self, blocks: &[Vec<Vec<usize>>]) -> Result<SheetGrade> {
        self.mapping.check_shape(blocks)?;

        let mut questions = Vec::with_capacity(self.mapping.len());
        for slot in self.mapping.slots() {
            let question = &self.quiz.questions[slot.question];
            let marked = &blocks[slot.block][slot.block_row];
            let mut summary = grade_question(
                question,
                marked,
                self.quiz.label_scheme,
                self.quiz.fail_mark,
                self.policy.as_ref(),
            )?;
            summary.row = slot.row;
            questions.push(summary);
        }

        let score = questions.iter().map(|q| q.mark).sum();
        let total = self.quiz.total_achievable();
        debug!(score, total, rows = questions.len(), "Sheet graded");
        Ok(SheetGrade {
            score,
            total,
            questions,
        })
    }
}

/// Grade one question from its marked column indices.
///
/// The returned summary has `row` set to `ordinal - 1`.
pub fn grade_question(
    question: &Question,
    marked: &[usize],
    scheme: ChoiceLabelScheme,
    fail_mark: f64,
    policy: &dyn ScoringPolicy,
) -> Result<QuestionSummary> {
    let weight_total = question.weight_total();
    let correct_count = question.correct_labels.len();

    // None once the row is void
    let mut acc = Some(0.0);
    let mut correct_choices = Vec::new();
    let mut wrong_choices = Vec::new();

    for &index in marked {
        let label = scheme.label(index).ok_or_else(|| {
            MarkscanError::MalformedSheetInput(format!(
                "question {}: column {index} has no {} label",
                question.ordinal,
                scheme.wire_name()
            ))
        })?;
        if question.is_correct(label) {
            let weight = question.weight_of(label).unwrap_or(0.0);
            acc = acc.map(|a| policy.on_correct(a, weight));
            correct_choices.push(label.to_string());
        } else {
            acc = acc.and_then(|a| policy.on_wrong(a, weight_total, correct_count));
            wrong_choices.push(label.to_string());
        }
    }

    let earned = acc.unwrap_or(0.0);
    let (mark, percentage_pass) = if earned > 0.0 && weight_total > 0.0 {
        let frac = (earned / weight_total).clamp(0.0, 1.0);
        (frac * question.total_mark, frac * 100.0)
    } else {
        (policy.zero_credit_points(fail_mark), 0.0)
    };

    Ok(QuestionSummary {
        row: question.ordinal.saturating_sub(1),
        ordinal: question.ordinal,
        correct_choices,
        wrong_choices,
        percentage_pass,
        mark,
    })
}
