// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Row-to-question mapping, validated before a grading session starts.

use markscan_core::error::{MarkscanError, Result};
use markscan_core::types::{MAX_CHOICES, MAX_QUESTIONS, Question, SheetConfiguration};

/// One grid row and the question it grades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSlot {
    /// Answer block, left to right.
    pub block: usize,
    /// Row within the block.
    pub block_row: usize,
    /// Row across all blocks, 0-based.
    pub row: usize,
    /// Index into `SheetConfiguration::questions`.
    pub question: usize,
}

/// Explicit correspondence between sampled grid rows and questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMapping {
    block_sizes: Vec<usize>,
    slots: Vec<RowSlot>,
}

impl RowMapping {
    /// Validate `quiz` and map every grid row to its question.
    ///
    /// Fails if there are more questions than two answer blocks can hold, if
    /// the question list does not match `question_count`, if the
    /// ordinals are not exactly `1..=n`, or if a correct label is missing
    /// from the scheme or lacks a positive weight.
    pub fn build(quiz: &SheetConfiguration) -> Result<Self> {
        let bad = |msg: String| Err(MarkscanError::MalformedSheetInput(msg));

        if quiz.choice_count == 0 || quiz.choice_count > MAX_CHOICES {
            return bad(format!(
                "choice_count must be 1..={MAX_CHOICES}, got {}",
                quiz.choice_count
            ));
        }
        if quiz.question_count == 0 {
            return bad("quiz has no questions".into());
        }
        if quiz.question_count > MAX_QUESTIONS {
            return bad(format!(
                "a sheet holds at most {MAX_QUESTIONS} questions, got {}",
                quiz.question_count
            ));
        }
        if quiz.questions.len() != quiz.question_count {
            return bad(format!(
                "quiz declares {} questions but defines {}",
                quiz.question_count,
                quiz.questions.len()
            ));
        }

        let n = quiz.question_count;
        let mut by_ordinal: Vec<Option<usize>> = vec![None; n];
        for (index, question) in quiz.questions.iter().enumerate() {
            let ordinal = question.ordinal;
            if ordinal == 0 || ordinal > n {
                return bad(format!("question ordinal {ordinal} is outside 1..={n}"));
            }
            if by_ordinal[ordinal - 1].replace(index).is_some() {
                return bad(format!("question ordinal {ordinal} appears twice"));
            }
            check_question(quiz, question)?;
        }

        let block_sizes = quiz.block_sizes();
        let mut slots = Vec::with_capacity(n);
        let mut row = 0;
        for (block, &size) in block_sizes.iter().enumerate() {
            for block_row in 0..size {
                // every ordinal was seen exactly once, so the slot is filled
                let Some(question) = by_ordinal[row] else {
                    return bad(format!("no question for row {row}"));
                };
                slots.push(RowSlot {
                    block,
                    block_row,
                    row,
                    question,
                });
                row += 1;
            }
        }

        Ok(Self { block_sizes, slots })
    }

    /// Expected row count of each answer block.
    pub fn block_sizes(&self) -> &[usize] {
        &self.block_sizes
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[RowSlot] {
        &self.slots
    }

    /// Reject a marks table whose shape differs from the mapping.
    pub fn check_shape<T>(&self, blocks: &[Vec<T>]) -> Result<()> {
        let found: Vec<usize> = blocks.iter().map(Vec::len).collect();
        if found != self.block_sizes {
            return Err(MarkscanError::MalformedSheetInput(format!(
                "marks table has block rows {found:?}, quiz expects {:?}",
                self.block_sizes
            )));
        }
        Ok(())
    }
}

fn check_question(quiz: &SheetConfiguration, question: &Question) -> Result<()> {
    for label in &question.correct_labels {
        let in_range = quiz
            .label_scheme
            .index_of(label)
            .is_some_and(|i| i < quiz.choice_count);
        if !in_range {
            return Err(MarkscanError::MalformedSheetInput(format!(
                "question {}: correct label {label:?} is not one of the first {} {} labels",
                question.ordinal,
                quiz.choice_count,
                quiz.label_scheme.wire_name()
            )));
        }
        match question.weight_of(label) {
            Some(w) if w > 0.0 => {}
            _ => {
                return Err(MarkscanError::MalformedSheetInput(format!(
                    "question {}: correct label {label:?} has no positive weight",
                    question.ordinal
                )));
            }
        }
    }
    if question.total_mark < 0.0 {
        return Err(MarkscanError::MalformedSheetInput(format!(
            "question {}: negative total_mark",
            question.ordinal
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use markscan_core::types::{ChoiceLabelScheme, QuizId};

    use super::*;

    fn question(ordinal: usize, correct: &str) -> Question {
        Question {
            ordinal,
            correct_labels: BTreeSet::from([correct.to_string()]),
            distractor_labels: BTreeSet::new(),
            mark_distribution: BTreeMap::from([(correct.to_string(), 100.0)]),
            total_mark: 1.0,
        }
    }

    fn quiz(n: usize) -> SheetConfiguration {
        SheetConfiguration {
            id: QuizId::new(),
            name: "Chemistry".into(),
            question_count: n,
            choice_count: 4,
            label_scheme: ChoiceLabelScheme::Alphabetic,
            fail_mark: 0.0,
            questions: (1..=n).map(|i| question(i, "A")).collect(),
        }
    }

    #[test]
    fn two_block_quiz_maps_rows_across_blocks() {
        let mut q = quiz(30);
        q.questions.reverse();
        let mapping = RowMapping::build(&q).unwrap();
        assert_eq!(mapping.block_sizes(), &[25, 5]);
        assert_eq!(mapping.len(), 30);

        let slot = mapping.slots()[26];
        assert_eq!((slot.block, slot.block_row, slot.row), (1, 1, 26));
        assert_eq!(q.questions[slot.question].ordinal, 27);
    }

    #[test]
    fn count_mismatch_fails_fast() {
        let mut q = quiz(5);
        q.questions.pop();
        assert!(matches!(
            RowMapping::build(&q),
            Err(MarkscanError::MalformedSheetInput(_))
        ));
    }

    #[test]
    fn more_questions_than_two_blocks_are_rejected() {
        assert_eq!(RowMapping::build(&quiz(50)).unwrap().block_sizes(), &[25, 25]);
        assert!(matches!(
            RowMapping::build(&quiz(60)),
            Err(MarkscanError::MalformedSheetInput(_))
        ));
    }

    #[test]
    fn duplicate_or_out_of_range_ordinals_fail() {
        let mut q = quiz(3);
        q.questions[2].ordinal = 2;
        assert!(RowMapping::build(&q).is_err());

        let mut q = quiz(3);
        q.questions[2].ordinal = 4;
        assert!(RowMapping::build(&q).is_err());
    }

    #[test]
    fn correct_label_must_fit_choice_count_and_weights() {
        let mut q = quiz(2);
        q.questions[0] = question(1, "E");
        assert!(RowMapping::build(&q).is_err(), "E is outside four choices");

        let mut q = quiz(2);
        q.questions[1].mark_distribution.clear();
        assert!(RowMapping::build(&q).is_err(), "missing weight");

        let mut q = quiz(2);
        q.label_scheme = ChoiceLabelScheme::Roman;
        assert!(RowMapping::build(&q).is_err(), "A is not a roman label");
    }

    #[test]
    fn shape_check_compares_block_rows() {
        let mapping = RowMapping::build(&quiz(27)).unwrap();
        let ok: Vec<Vec<Vec<usize>>> = vec![vec![vec![]; 25], vec![vec![]; 2]];
        let bad: Vec<Vec<Vec<usize>>> = vec![vec![vec![]; 27]];
        assert!(mapping.check_shape(&ok).is_ok());
        assert!(mapping.check_shape(&bad).is_err());
    }
}
