// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistence ports. The grading core talks to storage only through these
// traits; `markscan-store` provides the SQLite implementation.

use crate::error::Result;
use crate::types::{GradingSession, QuizId, SheetImage, SheetRecord, Student};

/// Resolve students by the code read from a sheet.
pub trait StudentDirectory {
    /// Look up a student enrolled under `quiz`. Returns None if not found.
    fn find_student(&self, quiz: &QuizId, code: &str) -> Result<Option<Student>>;
}

/// Session bookkeeping, image state, and result storage.
pub trait GradingLedger {
    /// Reserve the next session number for `quiz`: max(existing) + 1, or 1.
    fn reserve_session(&self, quiz: &QuizId) -> Result<GradingSession>;

    /// Drop a reservation that never received a result. A session that
    /// already holds results is kept.
    fn release_session(&self, quiz: &QuizId, session: GradingSession) -> Result<()>;

    /// Images of `quiz` still waiting to be graded.
    fn pending_images(&self, quiz: &QuizId) -> Result<Vec<SheetImage>>;

    /// Persist a graded sheet and move its image to corrected storage.
    ///
    /// Either everything lands (results, status, location, counters) or an
    /// error is returned. When the image cannot be restored after a failed
    /// write, the error is `InconsistentImageState`.
    fn commit_sheet(&self, image: &SheetImage, record: &SheetRecord) -> Result<SheetImage>;
}
