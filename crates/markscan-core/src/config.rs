// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Grader configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MarkscanError, Result};

/// Tunables for the whole grading pipeline.
///
/// Every constant is calibrated against the standard printed sheet; none of
/// them is adjusted per sheet at runtime.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraderConfig {
    pub normalizer: NormalizerConfig,
    pub regions: RegionConfig,
    pub marks: MarkConfig,
    pub scoring: ScoringPolicyKind,
}

/// Page boundary detection and binarization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Photos taller than this are downsampled before contour search.
    pub max_height: u32,
    /// How many of the largest contours are tried as the page boundary.
    pub candidate_count: usize,
    /// Polygon approximation tolerance as a fraction of the perimeter.
    pub approx_epsilon: f64,
    /// Half-size of the local-mean window used for adaptive thresholding.
    pub threshold_block_radius: u32,
    /// Subtracted from the local mean before comparing.
    pub threshold_offset: i32,
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_height: 500,
            candidate_count: 5,
            approx_epsilon: 0.02,
            threshold_block_radius: 53,
            threshold_offset: 4,
            blur_sigma: 1.0,
            canny_low: 20.0,
            canny_high: 90.0,
        }
    }
}

/// Region detection and canonical warp sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Contours enclosing less area than this are treated as noise.
    pub min_area: f64,
    /// Warp target for each answer block, `(width, height)`.
    pub answer_block_size: (u32, u32),
    /// Warp target for the identifier region, `(width, height)`.
    pub identifier_size: (u32, u32),
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            min_area: 50.0,
            answer_block_size: (700, 900),
            identifier_size: (300, 100),
        }
    }
}

/// Bubble fill decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkConfig {
    /// Minimum foreground pixel count for a cell to count as marked.
    pub fill_threshold: u32,
    /// Pixels at or below this intensity are foreground (ink).
    pub foreground_cutoff: u8,
}

impl Default for MarkConfig {
    fn default() -> Self {
        Self {
            fill_threshold: 4520,
            foreground_cutoff: 200,
        }
    }
}

/// Which scoring policy grades each question row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicyKind {
    /// Any wrong mark voids the row; zero credit costs the fail mark.
    #[default]
    AllOrNothing,
    /// Wrong marks deduct the mean correct weight instead of voiding.
    Proportional,
    /// Like all-or-nothing, but zero credit costs nothing.
    NoPenalty,
}

impl GraderConfig {
    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(MarkscanError::MalformedSheetInput(format!("config: {msg}")));
        if self.normalizer.max_height == 0 {
            return bad("normalizer.max_height must be positive");
        }
        if self.normalizer.candidate_count == 0 {
            return bad("normalizer.candidate_count must be positive");
        }
        if self.normalizer.approx_epsilon <= 0.0 {
            return bad("normalizer.approx_epsilon must be positive");
        }
        let (bw, bh) = self.regions.answer_block_size;
        let (iw, ih) = self.regions.identifier_size;
        if bw == 0 || bh == 0 || iw == 0 || ih == 0 {
            return bad("region sizes must be non-zero");
        }
        Ok(())
    }
}
