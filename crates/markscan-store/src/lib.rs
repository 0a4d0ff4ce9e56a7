// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// markscan-store — SQLite persistence for quizzes, students, scans and
// results, plus the on-disk image vault.

pub mod integrity;
pub mod store;
pub mod vault;

pub use integrity::hash_bytes;
pub use store::{ImageCounters, SqliteStore};
pub use vault::ImageVault;
