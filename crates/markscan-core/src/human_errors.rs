// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator-facing explanations for grading failures.
//
// Every technical error is mapped to a plain statement of what went wrong
// with the sheet and what the person running the grader can do about it.

use crate::error::MarkscanError;

/// Who has to act on an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Retaking the photo usually fixes it.
    Rescan,
    /// The quiz, student list, or config needs editing.
    FixSetup,
    /// Storage or environment trouble; retry once it is resolved.
    Environment,
}

/// A plain-language error with an actionable suggestion.
#[derive(Debug, Clone)]
pub struct Explanation {
    pub message: String,
    pub suggestion: String,
    /// Whether running the same command again can succeed unchanged.
    pub retriable: bool,
    pub severity: Severity,
}

/// Explain a `MarkscanError` to the operator.
pub fn explain(err: &MarkscanError) -> Explanation {
    match err {
        MarkscanError::BoundaryNotFound { .. } => Explanation {
            message: "The edges of the answer sheet could not be found in the photo.".into(),
            suggestion: "Photograph the whole sheet against a darker, plain background with all four corners visible.".into(),
            retriable: false,
            severity: Severity::Rescan,
        },

        MarkscanError::RegionShapeInvalid(detail) => Explanation {
            message: "The answer boxes on the sheet were not recognised.".into(),
            suggestion: format!(
                "Check the sheet was printed from the template for this quiz and that no box is folded or cut off. ({detail})"
            ),
            retriable: false,
            severity: Severity::Rescan,
        },

        MarkscanError::MalformedSheetInput(detail) => Explanation {
            message: "The sheet or quiz setup could not be used.".into(),
            suggestion: format!("Check the image file and the quiz's questions and answers. ({detail})"),
            retriable: false,
            severity: Severity::FixSetup,
        },

        MarkscanError::StudentNotFound { code } => Explanation {
            message: format!("No student with code {code:?} is enrolled in this quiz."),
            suggestion: "Add the student to the quiz, or rescan if the code box is smudged.".into(),
            retriable: false,
            severity: Severity::FixSetup,
        },

        MarkscanError::TextExtraction(detail) => Explanation {
            message: "The student code could not be read.".into(),
            suggestion: format!("Make sure the code is written clearly inside its box. ({detail})"),
            retriable: false,
            severity: Severity::Rescan,
        },

        MarkscanError::CapabilityUnavailable => Explanation {
            message: "Text recognition is not available in this build.".into(),
            suggestion: "Rebuild with the `ocr` feature and install the OCR models.".into(),
            retriable: false,
            severity: Severity::Environment,
        },

        MarkscanError::InconsistentImageState(detail) => Explanation {
            message: "A graded image was left half-moved.".into(),
            suggestion: format!("Move the file back to the pending folder by hand before grading again. ({detail})"),
            retriable: false,
            severity: Severity::Environment,
        },

        MarkscanError::PersistenceFailure(detail) => Explanation {
            message: "Results could not be saved.".into(),
            suggestion: format!("Check the database file is writable, then try again. ({detail})"),
            retriable: true,
            severity: Severity::Environment,
        },

        MarkscanError::Io(e) => Explanation {
            message: "A file could not be read or written.".into(),
            suggestion: format!("Check the path and its permissions. ({e})"),
            retriable: true,
            severity: Severity::Environment,
        },

        MarkscanError::Serialization(e) => Explanation {
            message: "A configuration or data file is not valid JSON.".into(),
            suggestion: format!("Fix the file and try again. ({e})"),
            retriable: false,
            severity: Severity::FixSetup,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_boundary_asks_for_rescan() {
        let e = explain(&MarkscanError::BoundaryNotFound { candidates: 5 });
        assert_eq!(e.severity, Severity::Rescan);
        assert!(!e.retriable);
    }

    #[test]
    fn unknown_student_names_the_code() {
        let e = explain(&MarkscanError::StudentNotFound { code: "CS101".into() });
        assert!(e.message.contains("CS101"));
        assert_eq!(e.severity, Severity::FixSetup);
    }

    #[test]
    fn storage_failure_is_retriable() {
        let e = explain(&MarkscanError::PersistenceFailure("locked".into()));
        assert!(e.retriable);
    }
}
