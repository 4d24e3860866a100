//! Transport implementations
//!
//! - **Usbfs**: FX2-LP USB bridge through `/dev/bus/usb` (real board)
//! - **Software**: deterministic simulation of the FPGA (tests, CI, dry runs)

pub mod software;
pub mod usbfs;

pub use software::{SoftwareAccelerator, SoftwareStats, ARTIFACT_BYTE};
pub use usbfs::UsbfsTransport;
