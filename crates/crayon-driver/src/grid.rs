//! Tile grid partitioning
//!
//! Rows index the horizontal axis and columns the vertical one, so cell
//! `(i, j)` sits at input anchor `(i·step_x, j·step_y)`. Pixels past the last
//! full tile on either axis are not covered; the grid uses integer division
//! and drops the remainder.

use crate::error::Result;
use crate::frame::Frame;
use crate::geometry::TilingGeometry;

/// Row and column count of the tiling of one input frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Grid {
    /// Cells along x
    pub rows: usize,
    /// Cells along y
    pub cols: usize,
}

impl Grid {
    /// Grid covering a `width × height` input
    pub fn compute(geometry: &TilingGeometry, width: usize, height: usize) -> Self {
        let (step_x, step_y) = geometry.step_in();
        let rows = width.saturating_sub(geometry.overlap()) / step_x;
        let cols = height.saturating_sub(geometry.overlap()) / step_y;

        if rows == 0 || cols == 0 {
            tracing::warn!(
                "{width}×{height} input is smaller than one {}×{} tile, nothing will be processed",
                geometry.tile_in().0,
                geometry.tile_in().1
            );
        }

        Self { rows, cols }
    }

    /// Number of cells
    pub const fn cell_count(&self) -> usize {
        self.rows * self.cols
    }

    /// True when `(i, j)` is a cell of this grid
    pub const fn contains(&self, i: usize, j: usize) -> bool {
        i < self.rows && j < self.cols
    }

    /// Cells in processing order: outer loop over rows, inner over columns
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        let cols = self.cols;
        (0..self.rows).flat_map(move |i| (0..cols).map(move |j| (i, j)))
    }

    /// Size of a reassembled output channel `(width, height)`
    pub const fn output_size(&self, geometry: &TilingGeometry) -> (usize, usize) {
        let (step_x, step_y) = geometry.step_out();
        (step_x * self.rows, step_y * self.cols)
    }
}

/// Input anchor of cell `(i, j)`
pub const fn input_anchor(geometry: &TilingGeometry, i: usize, j: usize) -> (usize, usize) {
    let (step_x, step_y) = geometry.step_in();
    (i * step_x, j * step_y)
}

/// Copy the input window of cell `(i, j)` into `tile`
///
/// `tile` must already have the geometry's input tile size; it is reused
/// across cells and never reallocated here.
///
/// # Errors
///
/// Returns a bounds error if the window leaves `input`.
pub fn extract_tile(
    geometry: &TilingGeometry,
    input: &Frame,
    i: usize,
    j: usize,
    tile: &mut Frame,
) -> Result<()> {
    let (x, y) = input_anchor(geometry, i, j);
    input.copy_window(x, y, tile)
}
