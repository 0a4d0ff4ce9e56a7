// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Markscan — Core types, configuration, and error definitions shared across
// all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod import;
pub mod layout;
pub mod ports;
pub mod types;

pub use config::GraderConfig;
pub use error::{ErrorKind, MarkscanError};
pub use import::QuizDocument;
pub use layout::{HorizontalSlot, RegionRole, RegionSpec, TemplateLayout};
pub use types::*;
