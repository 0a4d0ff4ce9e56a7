// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// markscan-scan — Image pipeline for photographed answer sheets.
//
// Page boundary detection and perspective correction, template region
// location, bubble grid sampling, and student code reading. Every stage talks
// to image primitives through the `VisionEngine` capability and to OCR
// through `TextExtractor`.

pub mod grid;
pub mod identifier;
pub mod normalize;
#[cfg(feature = "ocr")]
pub mod ocr;
pub mod pipeline;
pub mod region;
pub mod vision;

// Re-export the primary structs so callers can use `markscan_scan::SheetScanner` etc.
pub use grid::{BubbleGrid, BubbleGridSampler, MarkDecisionUnit};
pub use identifier::{IdentifierReader, TextExtractor, UnavailableTextExtractor};
pub use normalize::{NormalizedSheet, SheetNormalizer};
pub use pipeline::{BlockMarks, ScannedSheet, SheetScanner};
pub use region::{LocatedRegions, RegionLocator, RegionWarper};
pub use vision::{Contour, ContourMode, ImageprocVision, Quad, VisionEngine};

#[cfg(feature = "ocr")]
pub use ocr::OcrTextExtractor;
