// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Markscan sheet grader.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MarkscanError, Result};

/// Maximum number of question rows printed in one physical answer block.
pub const MAX_ROWS_PER_BLOCK: usize = 25;

/// A sheet prints at most two answer blocks.
pub const MAX_QUESTIONS: usize = 2 * MAX_ROWS_PER_BLOCK;

/// Maximum number of choices per question supported by the label schemes.
pub const MAX_CHOICES: usize = 5;

/// Unique identifier for a sheet configuration (quiz).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuizId(pub Uuid);

impl QuizId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QuizId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QuizId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QuizId {
    type Err = MarkscanError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| MarkscanError::MalformedSheetInput(format!("bad quiz id {s:?}: {e}")))
    }
}

/// Unique identifier for an uploaded sheet image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageId(pub Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ImageId {
    type Err = MarkscanError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| MarkscanError::MalformedSheetInput(format!("bad image id {s:?}: {e}")))
    }
}

/// How choice columns are labelled on the printed sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceLabelScheme {
    /// A, B, C, D, E
    Alphabetic,
    /// i, ii, iii, iv, v
    Roman,
    /// 1, 2, 3, 4, 5
    Numeric,
}

impl ChoiceLabelScheme {
    fn labels(&self) -> &'static [&'static str; MAX_CHOICES] {
        match self {
            Self::Alphabetic => &["A", "B", "C", "D", "E"],
            Self::Roman => &["i", "ii", "iii", "iv", "v"],
            Self::Numeric => &["1", "2", "3", "4", "5"],
        }
    }

    /// Label printed above column `index` (0-based), if the scheme has one.
    pub fn label(&self, index: usize) -> Option<&'static str> {
        self.labels().get(index).copied()
    }

    /// Column index of `label` within this scheme.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels().iter().position(|l| *l == label)
    }

    /// The wire form used by the sheet editor (`"A-B-C"` etc.).
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Alphabetic => "A-B-C",
            Self::Roman => "i-ii-iii",
            Self::Numeric => "1-2-3",
        }
    }
}

impl FromStr for ChoiceLabelScheme {
    type Err = MarkscanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "A-B-C" | "alphabetic" => Ok(Self::Alphabetic),
            "i-ii-iii" | "roman" => Ok(Self::Roman),
            "1-2-3" | "numeric" => Ok(Self::Numeric),
            other => Err(MarkscanError::MalformedSheetInput(format!(
                "unknown choice label scheme {other:?}"
            ))),
        }
    }
}

/// One question row of a sheet configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// 1-based position on the sheet; equals the sampled grid row order.
    pub ordinal: usize,
    /// Labels that earn credit.
    pub correct_labels: BTreeSet<String>,
    /// Distractor labels. Stored for the editor, not used in scoring.
    #[serde(default)]
    pub distractor_labels: BTreeSet<String>,
    /// Weight per correct label. Weights need not sum to 100.
    pub mark_distribution: BTreeMap<String, f64>,
    /// Points awarded for a perfect answer.
    pub total_mark: f64,
}

impl Question {
    /// Sum of all configured weights for this question.
    pub fn weight_total(&self) -> f64 {
        self.mark_distribution.values().sum()
    }

    pub fn weight_of(&self, label: &str) -> Option<f64> {
        self.mark_distribution.get(label).copied()
    }

    pub fn is_correct(&self, label: &str) -> bool {
        self.correct_labels.contains(label)
    }

    /// Parse a space-separated label list such as `"A B"`.
    pub fn parse_labels(raw: &str) -> BTreeSet<String> {
        raw.split_whitespace().map(str::to_owned).collect()
    }

    /// Parse the compact distribution form `"A 70;B 30"`.
    pub fn parse_distribution(raw: &str) -> Result<BTreeMap<String, f64>> {
        let mut dist = BTreeMap::new();
        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let mut fields = part.split_whitespace();
            let (Some(label), Some(weight), None) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(MarkscanError::MalformedSheetInput(format!(
                    "bad mark distribution entry {part:?}"
                )));
            };
            let weight: f64 = weight.parse().map_err(|_| {
                MarkscanError::MalformedSheetInput(format!("bad weight in {part:?}"))
            })?;
            dist.insert(label.to_owned(), weight);
        }
        Ok(dist)
    }
}

/// A quiz definition: everything the core needs to grade one sheet layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetConfiguration {
    pub id: QuizId,
    pub name: String,
    pub question_count: usize,
    pub choice_count: usize,
    pub label_scheme: ChoiceLabelScheme,
    /// Flat penalty applied to a question that earns no credit.
    pub fail_mark: f64,
    pub questions: Vec<Question>,
}

impl SheetConfiguration {
    /// Row counts of the physical answer blocks, left to right.
    pub fn block_sizes(&self) -> Vec<usize> {
        if self.question_count > MAX_ROWS_PER_BLOCK {
            vec![MAX_ROWS_PER_BLOCK, self.question_count - MAX_ROWS_PER_BLOCK]
        } else {
            vec![self.question_count]
        }
    }

    pub fn is_two_block(&self) -> bool {
        self.question_count > MAX_ROWS_PER_BLOCK
    }

    /// Sum of every question's `total_mark`.
    pub fn total_achievable(&self) -> f64 {
        self.questions.iter().map(|q| q.total_mark).sum()
    }
}

/// A student enrolled under one sheet configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Unique code printed or written in the identifier region.
    pub code: String,
    pub name: String,
    pub email: String,
    pub quiz_id: QuizId,
}

/// Lifecycle of an uploaded scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    /// Uploaded, waiting in the pending directory.
    Pending,
    /// Graded and moved to the corrected directory.
    Corrected,
}

impl ImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Corrected => "corrected",
        }
    }
}

impl FromStr for ImageStatus {
    type Err = MarkscanError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "corrected" => Ok(Self::Corrected),
            other => Err(MarkscanError::PersistenceFailure(format!(
                "unknown image status {other:?}"
            ))),
        }
    }
}

/// A raw uploaded scan of one answer sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetImage {
    pub id: ImageId,
    pub quiz_id: QuizId,
    pub path: PathBuf,
    pub status: ImageStatus,
    /// SHA-256 of the uploaded bytes, hex encoded.
    pub content_hash: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Session number scoping one correction batch of a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GradingSession(pub u32);

impl std::fmt::Display for GradingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one question for one student in one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentQuestionResult {
    pub student_code: String,
    pub question_ordinal: usize,
    pub session: GradingSession,
    pub correct_choices: Vec<String>,
    pub wrong_choices: Vec<String>,
    pub percentage_pass: f64,
    pub mark: f64,
}

/// Aggregate outcome of one sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetResult {
    pub quiz_id: QuizId,
    pub image_id: ImageId,
    pub student_code: String,
    pub session: GradingSession,
    pub score: f64,
    pub total: f64,
    pub graded_at: DateTime<Utc>,
}

/// Everything written for one graded sheet, committed as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetRecord {
    pub result: SheetResult,
    pub questions: Vec<StudentQuestionResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_schemes_are_positional() {
        assert_eq!(ChoiceLabelScheme::Alphabetic.label(0), Some("A"));
        assert_eq!(ChoiceLabelScheme::Roman.label(3), Some("iv"));
        assert_eq!(ChoiceLabelScheme::Numeric.label(1), Some("2"));
        assert_eq!(ChoiceLabelScheme::Numeric.index_of("2"), Some(1));
        assert_eq!(ChoiceLabelScheme::Alphabetic.label(5), None);
    }

    #[test]
    fn label_scheme_accepts_wire_and_plain_names() {
        assert_eq!("A-B-C".parse::<ChoiceLabelScheme>().unwrap(), ChoiceLabelScheme::Alphabetic);
        assert_eq!("roman".parse::<ChoiceLabelScheme>().unwrap(), ChoiceLabelScheme::Roman);
        assert!("a/b/c".parse::<ChoiceLabelScheme>().is_err());
    }

    #[test]
    fn parse_compact_distribution() {
        let dist = Question::parse_distribution("A 70;B 30").unwrap();
        assert_eq!(dist.get("A"), Some(&70.0));
        assert_eq!(dist.get("B"), Some(&30.0));
        assert!(Question::parse_distribution("A seventy").is_err());
    }

    #[test]
    fn block_sizes_split_after_twenty_five() {
        let mut cfg = SheetConfiguration {
            id: QuizId::new(),
            name: "midterm".into(),
            question_count: 40,
            choice_count: 4,
            label_scheme: ChoiceLabelScheme::Alphabetic,
            fail_mark: 0.0,
            questions: Vec::new(),
        };
        assert_eq!(cfg.block_sizes(), vec![25, 15]);
        cfg.question_count = 25;
        assert_eq!(cfg.block_sizes(), vec![25]);
        assert!(!cfg.is_two_block());
    }
}
