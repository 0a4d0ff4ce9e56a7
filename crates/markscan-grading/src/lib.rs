// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// markscan-grading — Scoring and correction orchestration for Markscan.
//
// Validates the row-to-question mapping, scores marked bubbles under a
// pluggable scoring policy, packages per-sheet outcomes, and drives
// single-sheet and batch correction against the storage ports.

pub mod accumulator;
pub mod corrector;
pub mod engine;
pub mod mapping;
pub mod scoring;

pub use accumulator::{BatchReport, QuizBatchReport, ResultAccumulator, SheetFailure, SheetOutcome};
pub use corrector::SheetCorrector;
pub use engine::{GradingEngine, QuestionSummary, SheetGrade, grade_question};
pub use mapping::{RowMapping, RowSlot};
pub use scoring::{AllOrNothing, NoPenalty, Proportional, ScoringPolicy, policy_for};
