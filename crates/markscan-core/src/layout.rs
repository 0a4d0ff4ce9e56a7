// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Template layout descriptor — which rectangle on a printed sheet plays
// which role, and what it must look like to be accepted.

use serde::{Deserialize, Serialize};

/// Role of a rectangular region on the printed sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionRole {
    /// Answer block `n`, counted left to right.
    AnswerBlock(usize),
    /// The box holding the student's code.
    Identifier,
}

/// Expected horizontal placement of a region relative to its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalSlot {
    Left,
    Right,
    Any,
}

/// Expected shape of one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub role: RegionRole,
    /// 0-based rank among qualifying rectangles sorted by area, largest first.
    pub area_rank: usize,
    pub slot: HorizontalSlot,
    /// Minimum region area as a fraction of the page area.
    pub min_area_fraction: f64,
    /// Maximum region area as a fraction of the page area.
    pub max_area_fraction: f64,
}

/// Named regions of one physical sheet template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateLayout {
    pub regions: Vec<RegionSpec>,
}

impl TemplateLayout {
    /// The layout of the standard printed sheet.
    ///
    /// Ranks are 0-based, largest first. Two-block sheets: rank 1 is the
    /// left block, rank 0 the right block, rank 2 the identifier.
    /// Single-block sheets: rank 0 is the block and rank 1 the identifier.
    pub fn standard(question_count: usize) -> Self {
        let regions = if question_count > crate::types::MAX_ROWS_PER_BLOCK {
            vec![
                RegionSpec {
                    role: RegionRole::AnswerBlock(0),
                    area_rank: 1,
                    slot: HorizontalSlot::Left,
                    min_area_fraction: 0.02,
                    max_area_fraction: 0.95,
                },
                RegionSpec {
                    role: RegionRole::AnswerBlock(1),
                    area_rank: 0,
                    slot: HorizontalSlot::Right,
                    min_area_fraction: 0.02,
                    max_area_fraction: 0.95,
                },
                RegionSpec {
                    role: RegionRole::Identifier,
                    area_rank: 2,
                    slot: HorizontalSlot::Any,
                    min_area_fraction: 0.0,
                    max_area_fraction: 0.5,
                },
            ]
        } else {
            vec![
                RegionSpec {
                    role: RegionRole::AnswerBlock(0),
                    area_rank: 0,
                    slot: HorizontalSlot::Any,
                    min_area_fraction: 0.02,
                    max_area_fraction: 0.95,
                },
                RegionSpec {
                    role: RegionRole::Identifier,
                    area_rank: 1,
                    slot: HorizontalSlot::Any,
                    min_area_fraction: 0.0,
                    max_area_fraction: 0.5,
                },
            ]
        };
        Self { regions }
    }

    /// Number of qualifying rectangles the sheet must contain.
    pub fn required_rectangles(&self) -> usize {
        self.regions
            .iter()
            .map(|r| r.area_rank + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn answer_block_count(&self) -> usize {
        self.regions
            .iter()
            .filter(|r| matches!(r.role, RegionRole::AnswerBlock(_)))
            .count()
    }

    pub fn spec_for(&self, role: RegionRole) -> Option<&RegionSpec> {
        self.regions.iter().find(|r| r.role == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_block_layout() {
        let layout = TemplateLayout::standard(20);
        assert_eq!(layout.required_rectangles(), 2);
        assert_eq!(layout.answer_block_count(), 1);
        assert_eq!(layout.spec_for(RegionRole::Identifier).unwrap().area_rank, 1);
    }

    #[test]
    fn two_block_layout_puts_second_largest_on_the_left() {
        let layout = TemplateLayout::standard(40);
        assert_eq!(layout.required_rectangles(), 3);
        let left = layout.spec_for(RegionRole::AnswerBlock(0)).unwrap();
        assert_eq!(left.area_rank, 1);
        assert_eq!(left.slot, HorizontalSlot::Left);
        assert_eq!(layout.spec_for(RegionRole::AnswerBlock(1)).unwrap().area_rank, 0);
    }
}
