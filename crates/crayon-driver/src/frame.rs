//! Single-channel 8-bit frame buffers
//!
//! Used for input frames, the reusable tile buffers and the reassembled
//! output channels. The buffer length always equals `width × height`.

use crate::error::{CrayonError, Result};
use crayon_chip::memory::COMPLEMENT_BIAS;
use std::ops::{Index, IndexMut};

/// Owned 2D buffer of single-byte samples, row-major
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Frame {
    /// Create a zero-filled frame
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Wrap raw row-major samples
    ///
    /// # Errors
    ///
    /// Returns a bounds error if `width * height` overflows or differs from
    /// `data.len()`.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        let len = width
            .checked_mul(height)
            .ok_or_else(|| CrayonError::bounds(format!("{width}×{height} frame overflows")))?;
        if data.len() != len {
            return Err(CrayonError::bounds(format!(
                "{} bytes cannot form a {width}×{height} frame",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Frame width
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Frame height
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Number of samples (`width × height`)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for a 0×N or N×0 frame
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw row-major samples
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw row-major samples
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the frame, returning its samples
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Sample at `(x, y)`, or `None` outside the frame
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        (x < self.width && y < self.height).then(|| self.data[y * self.width + x])
    }

    /// Replace the buffer with a zeroed one of the new size
    ///
    /// Previous contents are discarded even when the size is unchanged.
    pub fn realloc(&mut self, width: usize, height: usize) -> &mut Self {
        self.width = width;
        self.height = height;
        self.data = vec![0; width * height];
        self
    }

    /// Set every sample to `value`
    pub fn fill(&mut self, value: u8) -> &mut Self {
        self.data.fill(value);
        self
    }

    /// Add the signed-sample bias to every sample (mod 256)
    ///
    /// Applying it twice restores the original samples.
    pub fn complement(&mut self) -> &mut Self {
        for sample in &mut self.data {
            *sample = sample.wrapping_add(COMPLEMENT_BIAS);
        }
        self
    }

    /// Overwrite the contents from the first `width × height` bytes of `data`
    ///
    /// # Errors
    ///
    /// Returns a bounds error if `data` is shorter than the frame.
    pub fn load(&mut self, data: &[u8]) -> Result<()> {
        let len = self.data.len();
        let source = data.get(..len).ok_or_else(|| {
            CrayonError::bounds(format!(
                "need {len} bytes to load a {}×{} frame, got {}",
                self.width,
                self.height,
                data.len()
            ))
        })?;
        self.data.copy_from_slice(source);
        Ok(())
    }

    /// Crop in place to the `width × height` window at `(anchor_x, anchor_y)`
    ///
    /// # Errors
    ///
    /// Returns a bounds error if the window leaves the frame. The frame is
    /// left untouched in that case.
    pub fn crop(
        &mut self,
        anchor_x: usize,
        anchor_y: usize,
        width: usize,
        height: usize,
    ) -> Result<&mut Self> {
        let mut output = Self::new(width, height);
        self.copy_window(anchor_x, anchor_y, &mut output)?;
        *self = output;
        Ok(self)
    }

    /// Copy the window of `dst`'s size anchored at `(anchor_x, anchor_y)` into `dst`
    ///
    /// # Errors
    ///
    /// Returns a bounds error if the window leaves this frame.
    pub fn copy_window(&self, anchor_x: usize, anchor_y: usize, dst: &mut Self) -> Result<()> {
        self.check_window(anchor_x, anchor_y, dst.width, dst.height)?;

        for y in 0..dst.height {
            let src_start = (anchor_y + y) * self.width + anchor_x;
            let dst_start = y * dst.width;
            dst.data[dst_start..dst_start + dst.width]
                .copy_from_slice(&self.data[src_start..src_start + dst.width]);
        }
        Ok(())
    }

    fn check_window(
        &self,
        anchor_x: usize,
        anchor_y: usize,
        width: usize,
        height: usize,
    ) -> Result<()> {
        let fits_x = anchor_x.checked_add(width).is_some_and(|end| end <= self.width);
        let fits_y = anchor_y.checked_add(height).is_some_and(|end| end <= self.height);
        if fits_x && fits_y {
            Ok(())
        } else {
            Err(CrayonError::bounds(format!(
                "{width}×{height} window at ({anchor_x}, {anchor_y}) leaves {}×{} frame",
                self.width, self.height
            )))
        }
    }
}

impl Index<(usize, usize)> for Frame {
    type Output = u8;

    fn index(&self, (x, y): (usize, usize)) -> &u8 {
        assert!(x < self.width && y < self.height, "({x}, {y}) outside frame");
        &self.data[y * self.width + x]
    }
}

impl IndexMut<(usize, usize)> for Frame {
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut u8 {
        assert!(x < self.width && y < self.height, "({x}, {y}) outside frame");
        &mut self.data[y * self.width + x]
    }
}
