//! Tiling geometry derived from an architecture descriptor
//!
//! Three numbers drive the whole tiling scheme:
//!
//! - **margin**: output-edge pixels of every tile whose convolution support
//!   reached outside the tile. Accumulated forward, from the first layer to
//!   the last, shrinking at every pooling stage.
//! - **overlap**: input pixels shared by neighbouring tiles so that every kept
//!   output pixel saw its full support. Accumulated backward, from the deepest
//!   layer outward, then reduced by the stride.
//! - **stride**: product of all pooling strides.
//!
//! The geometry is an immutable value whose fields are only reachable through
//! accessors, so every instance went through the checks of
//! [`TilingGeometry::new`]. Reconfiguring the network means building a new one.

use crate::arch::{ArchitectureDescriptor, LayerKind};
use crate::error::{CrayonError, Result};
use crayon_chip::memory::{TILE_HEIGHT, TILE_WIDTH};

/// Geometry of one network on one tile size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingGeometry {
    margin: usize,
    overlap: usize,
    stride: usize,
    tile_in: (usize, usize),
    tile_out: (usize, usize),
}

impl TilingGeometry {
    /// Derive the geometry of `arch` on a `tile_width × tile_height` input tile
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the tile cannot be tiled with this
    /// network: a tile not wider/taller than the overlap, smaller than the
    /// stride, or an output tile not larger than the margin or shorter than
    /// two rows.
    pub fn new(
        arch: &ArchitectureDescriptor,
        tile_width: usize,
        tile_height: usize,
    ) -> Result<Self> {
        let (margin, overlap, stride) = derive(arch)?;

        if tile_width <= overlap || tile_height <= overlap {
            return Err(CrayonError::config(format!(
                "{arch}: overlap {overlap} leaves no step on a {tile_width}×{tile_height} tile"
            )));
        }

        let tile_out = (tile_width / stride, tile_height / stride);
        if tile_out.0 <= margin || tile_out.1 <= margin {
            return Err(CrayonError::config(format!(
                "{arch}: margin {margin} consumes the whole {}×{} output tile",
                tile_out.0, tile_out.1
            )));
        }
        if tile_out.1 < 2 {
            return Err(CrayonError::config(format!(
                "{arch}: output tile needs at least two rows, got {}",
                tile_out.1
            )));
        }

        tracing::debug!(
            "Geometry {arch}: stride {stride}, margin {margin}, overlap {overlap}, \
             tile {tile_width}×{tile_height} → {}×{}",
            tile_out.0,
            tile_out.1
        );

        Ok(Self {
            margin,
            overlap,
            stride,
            tile_in: (tile_width, tile_height),
            tile_out,
        })
    }

    /// Geometry on the board's own memory tile
    ///
    /// # Errors
    ///
    /// See [`TilingGeometry::new`].
    pub fn for_board(arch: &ArchitectureDescriptor) -> Result<Self> {
        Self::new(arch, TILE_WIDTH, TILE_HEIGHT)
    }

    /// Output-edge trim applied to every returned tile
    pub const fn margin(&self) -> usize {
        self.margin
    }

    /// Input pixels shared by adjacent tiles
    pub const fn overlap(&self) -> usize {
        self.overlap
    }

    /// Cumulative spatial downsampling factor
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Input tile `(width, height)` enforced by the accelerator memory
    pub const fn tile_in(&self) -> (usize, usize) {
        self.tile_in
    }

    /// Output tile `(width, height)`, `tile_in / stride`
    pub const fn tile_out(&self) -> (usize, usize) {
        self.tile_out
    }

    /// Input step between neighbouring tile anchors `(x, y)`
    pub const fn step_in(&self) -> (usize, usize) {
        (self.tile_in.0 - self.overlap, self.tile_in.1 - self.overlap)
    }

    /// Output step between neighbouring tile anchors `(x, y)`
    pub const fn step_out(&self) -> (usize, usize) {
        (self.tile_out.0 - self.margin, self.tile_out.1 - self.margin)
    }

    /// Bytes of one output channel inside a received payload
    pub const fn channel_bytes(&self) -> usize {
        self.tile_out.0 * self.tile_out.1
    }
}

/// `(margin, overlap, stride)` of a descriptor
fn derive(arch: &ArchitectureDescriptor) -> Result<(usize, usize, usize)> {
    let overflow = || CrayonError::config(format!("{arch}: geometry overflows"));

    let mut margin = 0usize;
    let mut stride = 1usize;
    for layer in arch.layers() {
        match layer.kind {
            LayerKind::Convolution => {
                margin = margin.checked_add(layer.param - 1).ok_or_else(overflow)?;
            }
            LayerKind::Pool => {
                margin /= layer.param;
                stride = stride.checked_mul(layer.param).ok_or_else(overflow)?;
            }
        }
    }

    let mut overlap = 1usize;
    for layer in arch.layers().iter().rev() {
        overlap = match layer.kind {
            LayerKind::Convolution => overlap.checked_add(layer.param - 1),
            LayerKind::Pool => overlap.checked_mul(layer.param),
        }
        .ok_or_else(overflow)?;
    }
    // The backward product always contains the stride, so this cannot go negative.
    let overlap = overlap - stride;

    Ok((margin, overlap, stride))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arch(s: &str) -> ArchitectureDescriptor {
        ArchitectureDescriptor::parse(s).unwrap()
    }

    #[test]
    fn test_reference_geometry() {
        let geometry = TilingGeometry::for_board(&arch("c9-p2-c9-p2-c9-p2-c9")).unwrap();

        assert_eq!(geometry.stride(), 8);
        assert_eq!(geometry.margin(), 15);
        assert_eq!(geometry.overlap(), 120);
        assert_eq!(geometry.tile_in(), (320, 240));
        assert_eq!(geometry.tile_out(), (40, 30));
        assert_eq!(geometry.step_in(), (200, 120));
        assert_eq!(geometry.step_out(), (25, 15));
        assert_eq!(geometry.channel_bytes(), 1200);
    }

    #[test]
    fn test_single_convolution() {
        let geometry = TilingGeometry::new(&arch("c5"), 16, 16).unwrap();

        assert_eq!(geometry.stride(), 1);
        assert_eq!(geometry.margin(), 4);
        assert_eq!(geometry.overlap(), 4);
        assert_eq!(geometry.tile_out(), (16, 16));
    }

    #[test]
    fn test_pool_only_has_no_overlap() {
        let geometry = TilingGeometry::new(&arch("p2-p2"), 16, 8).unwrap();

        assert_eq!(geometry.stride(), 4);
        assert_eq!(geometry.margin(), 0);
        assert_eq!(geometry.overlap(), 0);
        assert_eq!(geometry.tile_out(), (4, 2));
    }

    #[test]
    fn test_margin_shrinks_at_pooling() {
        // forward: 4 → 2 → 4; backward: 1 → 3 → 6 → 10, minus stride 2
        let geometry = TilingGeometry::new(&arch("c5-p2-c3"), 64, 64).unwrap();

        assert_eq!(geometry.margin(), 4);
        assert_eq!(geometry.overlap(), 8);
    }

    #[test]
    fn test_tile_too_small_for_overlap() {
        let err = TilingGeometry::new(&arch("c9-p2-c9-p2-c9-p2-c9"), 120, 240).unwrap_err();
        assert!(matches!(err, CrayonError::Config { .. }));
    }

    #[test]
    fn test_margin_consumes_output_tile() {
        let err = TilingGeometry::new(&arch("c9-p2-c9-p2-c9-p2-c9"), 121, 121).unwrap_err();
        assert!(matches!(err, CrayonError::Config { .. }));
    }

    #[test]
    fn test_steps_always_positive() {
        // Smallest tiles that pass every check still leave a step of one
        let geometry = TilingGeometry::new(&arch("c3"), 3, 3).unwrap();
        assert_eq!(geometry.overlap(), 2);
        assert_eq!(geometry.step_in(), (1, 1));
        assert_eq!(geometry.step_out(), (1, 1));

        assert!(TilingGeometry::new(&arch("c3"), 2, 3).is_err());
    }
}
