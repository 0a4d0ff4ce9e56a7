// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Markscan.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all Markscan operations.
#[derive(Debug, Error)]
pub enum MarkscanError {
    // -- Sheet geometry --
    #[error("sheet boundary not found among the {candidates} largest contours")]
    BoundaryNotFound { candidates: usize },

    #[error("answer sheet regions do not match the template: {0}")]
    RegionShapeInvalid(String),

    #[error("malformed sheet input: {0}")]
    MalformedSheetInput(String),

    // -- Identification --
    #[error("no student with code {code:?}")]
    StudentNotFound { code: String },

    #[error("text extraction failed: {0}")]
    TextExtraction(String),

    // -- Storage / persistence --
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("image location and status disagree: {0}")]
    InconsistentImageState(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Capabilities --
    #[error("capability not available in this build")]
    CapabilityUnavailable,
}

/// Coarse classification of a [`MarkscanError`], reported in batch error lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BoundaryNotFound,
    RegionShapeInvalid,
    MalformedSheetInput,
    StudentNotFound,
    TextExtraction,
    PersistenceFailure,
    InconsistentImageState,
    CapabilityUnavailable,
}

impl MarkscanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BoundaryNotFound { .. } => ErrorKind::BoundaryNotFound,
            Self::RegionShapeInvalid(_) => ErrorKind::RegionShapeInvalid,
            Self::MalformedSheetInput(_) => ErrorKind::MalformedSheetInput,
            Self::StudentNotFound { .. } => ErrorKind::StudentNotFound,
            Self::TextExtraction(_) => ErrorKind::TextExtraction,
            Self::PersistenceFailure(_) | Self::Io(_) | Self::Serialization(_) => {
                ErrorKind::PersistenceFailure
            }
            Self::InconsistentImageState(_) => ErrorKind::InconsistentImageState,
            Self::CapabilityUnavailable => ErrorKind::CapabilityUnavailable,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MarkscanError>;
