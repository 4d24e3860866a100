//! Tiling, transport and reassembly driver for the CrayOn FPGA accelerator.
//!
//! The board holds a single 320×240 working tile. This crate slices arbitrary
//! frames into overlapping tiles sized from the network architecture, drives
//! the request/response exchange over the FX2-LP USB bridge, and stitches the
//! per-tile label maps back into full-resolution channels.
//!
//! # Pipeline
//!
//! ```text
//! "c9-p2-c9-p2-c9-p2-c9"
//!     → ArchitectureDescriptor → TilingGeometry (margin 15, overlap 120, stride 8)
//!     → Grid (per input frame)
//!     → AcceleratorSession::process
//!         per cell: tile → Transport → WaitPolicy → Transport → OutputChannels
//! ```
//!
//! # Transports
//!
//! ```text
//! Hardware:
//!   UsbfsTransport      : FX2-LP bridge via /dev/bus/usb (vendor requests + bulk)
//!
//! Development / CI:
//!   SoftwareAccelerator : deterministic simulated board
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use crayon_driver::{
//!     AcceleratorSession, ArchitectureDescriptor, BridgeManager, Frame, SessionConfig,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bridge = BridgeManager::discover()?.open("transceiver")?;
//! let arch = ArchitectureDescriptor::parse("c9-p2-c9-p2-c9-p2-c9")?;
//! let mut session = AcceleratorSession::new(bridge, arch, SessionConfig::default())?;
//!
//! session.push(Frame::from_raw(720, 240, std::fs::read("frame.raw")?)?);
//! session.process()?;
//! let heat = session.pull(0)?;
//! println!("label 0: {}×{}", heat.width(), heat.height());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod arch;
pub mod backends;
mod config;
mod discovery;
mod error;
mod frame;
mod geometry;
pub mod grid;
mod listing;
mod loading;
pub mod reassembly;
mod session;
mod transport;
pub mod wait;

/// Hardware identification constants (re-exported from crayon-chip).
pub mod usb_ids {
    pub use crayon_chip::usb::{lsusb_filter, DEFAULT_PRODUCT, PRODUCT_ID, VENDOR_ID};
}

pub use arch::{ArchitectureDescriptor, LayerKind, LayerSpec};
pub use backends::{SoftwareAccelerator, UsbfsTransport};
pub use config::SessionConfig;
pub use discovery::{BridgeInfo, BridgeManager};
pub use error::{CrayonError, Result};
pub use frame::Frame;
pub use geometry::TilingGeometry;
pub use grid::Grid;
pub use listing::{parse_listing, ConfigImage, MemoryTarget};
pub use loading::{ConfigLoader, LoadConfig, LoadMetrics};
pub use reassembly::OutputChannels;
pub use session::{AcceleratorSession, ProcessMetrics};
pub use transport::{Transport, TransportType};
pub use wait::{AcknowledgedWait, FixedDelay, NoWait, WaitPolicy};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        AcceleratorSession, AcknowledgedWait, ArchitectureDescriptor, BridgeManager, ConfigImage,
        CrayonError, FixedDelay, Frame, MemoryTarget, Result, SessionConfig, SoftwareAccelerator,
        TilingGeometry, Transport, UsbfsTransport,
    };
}
