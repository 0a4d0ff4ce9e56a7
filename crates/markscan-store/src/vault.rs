// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image vault — on-disk storage for uploaded scans. Pending scans live in
// `<root>/pending`, graded ones in `<root>/corrected`.

use std::fs;
use std::path::{Path, PathBuf};

use markscan_core::error::{MarkscanError, Result};
use markscan_core::types::ImageId;
use tracing::debug;

const PENDING_DIR: &str = "pending";
const CORRECTED_DIR: &str = "corrected";

#[derive(Debug, Clone)]
pub struct ImageVault {
    root: PathBuf,
}

impl ImageVault {
    /// Open a vault rooted at `root`, creating its directories.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let vault = Self { root: root.into() };
        fs::create_dir_all(vault.pending_dir())?;
        fs::create_dir_all(vault.corrected_dir())?;
        Ok(vault)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pending_dir(&self) -> PathBuf {
        self.root.join(PENDING_DIR)
    }

    pub fn corrected_dir(&self) -> PathBuf {
        self.root.join(CORRECTED_DIR)
    }

    /// Write uploaded bytes as `pending/<id>.<extension>`.
    pub fn store_pending(&self, id: &ImageId, extension: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.pending_dir().join(file_name(id, extension));
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Scan stored");
        Ok(path)
    }

    /// Move a pending scan into the corrected directory.
    pub fn move_to_corrected(&self, pending: &Path) -> Result<PathBuf> {
        let name = pending.file_name().ok_or_else(|| {
            MarkscanError::PersistenceFailure(format!("{} has no file name", pending.display()))
        })?;
        let target = self.corrected_dir().join(name);
        fs::rename(pending, &target)?;
        debug!(from = %pending.display(), to = %target.display(), "Scan moved to corrected");
        Ok(target)
    }

    /// Undo [`move_to_corrected`](Self::move_to_corrected).
    pub fn move_back(&self, corrected: &Path, pending: &Path) -> Result<()> {
        fs::rename(corrected, pending)?;
        debug!(to = %pending.display(), "Scan restored to pending");
        Ok(())
    }

    pub fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }
}

fn file_name(id: &ImageId, extension: &str) -> String {
    let ext = extension.trim_start_matches('.');
    if ext.is_empty() {
        id.to_string()
    } else {
        format!("{id}.{}", ext.to_ascii_lowercase())
    }
}
