//! On-board memory layout.
//!
//! The FPGA holds exactly one input tile at a time. Its size is fixed by the
//! block RAM budget and does not depend on the network loaded into it.

/// Width of the on-board input tile (pixels).
pub const TILE_WIDTH: usize = 320;

/// Height of the on-board input tile (pixels).
pub const TILE_HEIGHT: usize = 240;

/// Bytes in one input tile (one byte per pixel).
pub const TILE_BYTES: usize = TILE_WIDTH * TILE_HEIGHT;

/// Bulk OUT payload. Every send moves exactly this many bytes.
pub const TX_PAYLOAD: usize = 76_800;

/// Bulk IN payload. Every receive moves exactly this many bytes; all output
/// channels of one tile are packed back to back inside it.
pub const RX_PAYLOAD: usize = 15_360;

/// Bias added to every sample before sending (and removed after receiving).
///
/// The FPGA works on signed 8-bit samples; adding 128 modulo 256 maps the
/// unsigned host range onto it.
pub const COMPLEMENT_BIAS: u8 = 128;
