// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scoring policies. A policy decides how marked labels move a question's
// credit accumulator and what a question with no credit costs.

use markscan_core::config::ScoringPolicyKind;

/// Per-row accumulator state machine.
///
/// The engine starts each row at zero, feeds every marked label through
/// `on_correct` or `on_wrong`, and awards `zero_credit_points` when the
/// accumulator ends at zero. `on_wrong` returning None voids the row: no
/// later mark in that row earns credit.
pub trait ScoringPolicy: Send + Sync {
    /// Short name, used in logs.
    fn name(&self) -> &'static str;

    fn on_correct(&self, acc: f64, weight: f64) -> f64 {
        acc + weight
    }

    fn on_wrong(&self, acc: f64, weight_total: f64, correct_count: usize) -> Option<f64>;

    fn zero_credit_points(&self, fail_mark: f64) -> f64;
}

/// Any wrong mark voids the row; zero credit costs the fail mark.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllOrNothing;

impl ScoringPolicy for AllOrNothing {
    fn name(&self) -> &'static str {
        "all_or_nothing"
    }

    fn on_wrong(&self, _acc: f64, _weight_total: f64, _correct_count: usize) -> Option<f64> {
        None
    }

    fn zero_credit_points(&self, fail_mark: f64) -> f64 {
        -fail_mark
    }
}

/// Each wrong mark takes back one average correct weight, never below zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct Proportional;

impl ScoringPolicy for Proportional {
    fn name(&self) -> &'static str {
        "proportional"
    }

    fn on_wrong(&self, acc: f64, weight_total: f64, correct_count: usize) -> Option<f64> {
        if correct_count == 0 {
            return Some(0.0);
        }
        Some((acc - weight_total / correct_count as f64).max(0.0))
    }

    fn zero_credit_points(&self, fail_mark: f64) -> f64 {
        -fail_mark
    }
}

/// All-or-nothing credit without a penalty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPenalty;

impl ScoringPolicy for NoPenalty {
    fn name(&self) -> &'static str {
        "no_penalty"
    }

    fn on_wrong(&self, _acc: f64, _weight_total: f64, _correct_count: usize) -> Option<f64> {
        None
    }

    fn zero_credit_points(&self, _fail_mark: f64) -> f64 {
        0.0
    }
}

/// Policy selected by configuration.
pub fn policy_for(kind: ScoringPolicyKind) -> Box<dyn ScoringPolicy> {
    match kind {
        ScoringPolicyKind::AllOrNothing => Box::new(AllOrNothing),
        ScoringPolicyKind::Proportional => Box::new(Proportional),
        ScoringPolicyKind::NoPenalty => Box::new(NoPenalty),
    }
}
