//! Output reassembly
//!
//! Every received tile is trimmed by the geometry margin on its top and left
//! edges and written into one full-size frame per output label. Neighbouring
//! trimmed tiles abut exactly: the output step equals the trimmed tile size.

use crate::error::{CrayonError, Result};
use crate::frame::Frame;
use crate::geometry::TilingGeometry;
use crate::grid::Grid;

/// Overwrite the last row of `tile` with its second-to-last row
///
/// The FPGA writes a corrupted last output row on every tile. Tiles shorter
/// than two rows are left alone; the geometry never produces them.
pub fn correct_boundary_row(tile: &mut Frame) {
    let (width, height) = (tile.width(), tile.height());
    if height < 2 {
        return;
    }
    let bytes = tile.as_bytes_mut();
    let last = (height - 1) * width;
    bytes.copy_within(last - width..last, last);
}

/// One full-size frame per accelerator output label
///
/// All channels always share the same dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChannels {
    frames: Vec<Frame>,
}

impl OutputChannels {
    /// `labels` zero-filled channels of `width × height`
    pub fn new(labels: usize, width: usize, height: usize) -> Self {
        Self {
            frames: vec![Frame::new(width, height); labels],
        }
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when no label is configured
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Channel dimensions `(width, height)`
    pub fn size(&self) -> (usize, usize) {
        self.frames
            .first()
            .map_or((0, 0), |f| (f.width(), f.height()))
    }

    /// Reallocate every channel, discarding contents
    pub fn realloc(&mut self, width: usize, height: usize) {
        for frame in &mut self.frames {
            frame.realloc(width, height);
        }
    }

    /// Replace the channel set by `labels` zero-filled channels of the current size
    pub fn set_label_count(&mut self, labels: usize) {
        let (width, height) = self.size();
        *self = Self::new(labels, width, height);
    }

    /// Channel of `label`
    ///
    /// # Errors
    ///
    /// Returns a bounds error for an unknown label.
    pub fn get(&self, label: usize) -> Result<&Frame> {
        self.frames.get(label).ok_or_else(|| {
            CrayonError::bounds(format!(
                "label {label} requested, {} configured",
                self.frames.len()
            ))
        })
    }

    /// All channels, indexed by label
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Consume the set, returning the channel frames
    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    /// Correct and place one decoded output tile of cell `(i, j)`
    ///
    /// Cells outside `grid` are skipped without error.
    ///
    /// # Errors
    ///
    /// Returns a bounds error for an unknown label or a tile whose size does
    /// not match the geometry.
    pub fn place_tile(
        &mut self,
        geometry: &TilingGeometry,
        grid: &Grid,
        i: usize,
        j: usize,
        label: usize,
        tile: &mut Frame,
    ) -> Result<()> {
        if !grid.contains(i, j) {
            tracing::trace!("Cell ({i}, {j}) outside {}×{} grid, skipped", grid.rows, grid.cols);
            return Ok(());
        }
        if (tile.width(), tile.height()) != geometry.tile_out() {
            return Err(CrayonError::bounds(format!(
                "{}×{} output tile, geometry expects {}×{}",
                tile.width(),
                tile.height(),
                geometry.tile_out().0,
                geometry.tile_out().1
            )));
        }
        let expected = grid.output_size(geometry);
        if self.size() != expected {
            return Err(CrayonError::bounds(format!(
                "{}×{} channels, grid expects {}×{}",
                self.size().0,
                self.size().1,
                expected.0,
                expected.1
            )));
        }
        let channels = self.frames.len();
        let channel = self.frames.get_mut(label).ok_or_else(|| {
            CrayonError::bounds(format!("label {label} requested, {channels} configured"))
        })?;

        correct_boundary_row(tile);

        let margin = geometry.margin();
        let (step_x, step_y) = geometry.step_out();
        let (anchor_x, anchor_y) = (i * step_x, j * step_y);
        let width = channel.width();
        let out = channel.as_bytes_mut();
        let src = tile.as_bytes();
        let tile_width = geometry.tile_out().0;

        for y in 0..step_y {
            let src_start = (margin + y) * tile_width + margin;
            let dst_start = (anchor_y + y) * width + anchor_x;
            out[dst_start..dst_start + step_x]
                .copy_from_slice(&src[src_start..src_start + step_x]);
        }
        Ok(())
    }
}
