// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bubble grid sampling and the fill decision.

use image::GrayImage;
use imageproc::rect::Rect;
use markscan_core::config::MarkConfig;
use markscan_core::error::{MarkscanError, Result};
use tracing::debug;

/// Split a `width` x `height` region into `rows` x `cols` cells, row-major.
///
/// Band `i` spans `[i * len / n, (i + 1) * len / n)`, so the cells never
/// overlap and together cover every pixel.
pub fn cell_rects(width: u32, height: u32, rows: usize, cols: usize) -> Result<Vec<Rect>> {
    check_grid(width, height, rows, cols)?;
    let xs = boundaries(width, cols);
    let ys = boundaries(height, rows);

    let mut cells = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let (x0, x1) = (xs[c], xs[c + 1]);
            let (y0, y1) = (ys[r], ys[r + 1]);
            cells.push(Rect::at(x0 as i32, y0 as i32).of_size(x1 - x0, y1 - y0));
        }
    }
    Ok(cells)
}

fn check_grid(width: u32, height: u32, rows: usize, cols: usize) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(MarkscanError::MalformedSheetInput(format!(
            "grid needs at least one row and column, got {rows}x{cols}"
        )));
    }
    if rows > height as usize || cols > width as usize {
        return Err(MarkscanError::MalformedSheetInput(format!(
            "{rows}x{cols} grid does not fit a {width}x{height} region"
        )));
    }
    Ok(())
}

fn boundaries(len: u32, parts: usize) -> Vec<u32> {
    (0..=parts)
        .map(|i| (i as u64 * len as u64 / parts as u64) as u32)
        .collect()
}

/// Foreground pixel count per cell of one answer block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BubbleGrid {
    pub rows: usize,
    pub cols: usize,
    /// Row-major counts, `rows * cols` long.
    pub counts: Vec<u32>,
}

impl BubbleGrid {
    pub fn count(&self, row: usize, col: usize) -> u32 {
        self.counts[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[u32] {
        &self.counts[row * self.cols..(row + 1) * self.cols]
    }
}

/// Measures fill intensity of every cell of a warped, binarized region.
#[derive(Debug, Clone, Copy)]
pub struct BubbleGridSampler {
    foreground_cutoff: u8,
}

impl BubbleGridSampler {
    pub fn new(foreground_cutoff: u8) -> Self {
        Self { foreground_cutoff }
    }

    pub fn from_config(config: &MarkConfig) -> Self {
        Self::new(config.foreground_cutoff)
    }

    /// Count foreground pixels in each cell in a single pass over the image.
    pub fn sample(&self, region: &GrayImage, rows: usize, cols: usize) -> Result<BubbleGrid> {
        let (width, height) = region.dimensions();
        check_grid(width, height, rows, cols)?;

        let col_of = band_lookup(width, cols);
        let row_of = band_lookup(height, rows);
        let mut counts = vec![0u32; rows * cols];

        for (x, y, pixel) in region.enumerate_pixels() {
            if pixel.0[0] <= self.foreground_cutoff {
                counts[row_of[y as usize] * cols + col_of[x as usize]] += 1;
            }
        }

        debug!(rows, cols, ink = counts.iter().sum::<u32>(), "Grid sampled");
        Ok(BubbleGrid { rows, cols, counts })
    }
}

/// Band index for every coordinate along one axis.
fn band_lookup(len: u32, parts: usize) -> Vec<usize> {
    let edges = boundaries(len, parts);
    let mut lookup = Vec::with_capacity(len as usize);
    for band in 0..parts {
        lookup.extend(std::iter::repeat_n(band, (edges[band + 1] - edges[band]) as usize));
    }
    lookup
}

/// Turns fill counts into the marked column indices of each row.
#[derive(Debug, Clone, Copy)]
pub struct MarkDecisionUnit {
    fill_threshold: u32,
}

impl MarkDecisionUnit {
    pub fn new(fill_threshold: u32) -> Self {
        Self { fill_threshold }
    }

    pub fn from_config(config: &MarkConfig) -> Self {
        Self::new(config.fill_threshold)
    }

    /// Ascending marked columns per row. Empty and multi-mark rows are kept.
    pub fn decide(&self, grid: &BubbleGrid) -> Vec<Vec<usize>> {
        (0..grid.rows)
            .map(|r| {
                grid.row(r)
                    .iter()
                    .enumerate()
                    .filter(|(_, count)| **count >= self.fill_threshold)
                    .map(|(c, _)| c)
                    .collect()
            })
            .collect()
    }
}
