//! FX2-LP USB bridge identifiers and vendor commands.
//!
//! The bridge firmware exposes one bulk endpoint per direction and four
//! vendor requests on EP0. A transfer is always armed with a vendor request
//! before the bulk transfer itself.

/// Vendor ID programmed into the bridge EEPROM.
pub const VENDOR_ID: u16 = 0x221A;

/// Product ID programmed into the bridge EEPROM.
pub const PRODUCT_ID: u16 = 0x0100;

/// Product string of the accelerator bridge.
pub const DEFAULT_PRODUCT: &str = "transceiver";

/// Number of product string bytes compared when matching a bridge.
pub const PRODUCT_MATCH_LEN: usize = 16;

/// Interface claimed for all transfers.
pub const INTERFACE: u32 = 0;

/// Bulk OUT endpoint (host → FPGA).
pub const EP_OUT: u8 = 0x06;

/// Bulk IN endpoint (FPGA → host).
pub const EP_IN: u8 = 0x82;

/// `bmRequestType` for every vendor request (vendor, device, host-to-device).
pub const VENDOR_REQUEST_TYPE: u8 = 0x40;

/// Vendor requests understood by the bridge firmware.
pub mod vendor {
    /// Arm the OUT FIFO for the next bulk write.
    pub const ARM_SEND: u8 = 0x80;
    /// Arm the IN FIFO for the next bulk read.
    pub const ARM_RECEIVE: u8 = 0x81;
    /// Raise a request line to the FPGA; `wValue` carries the request code.
    pub const REQUEST: u8 = 0x82;
    /// Reset both FIFOs and the FPGA interface.
    pub const RESET: u8 = 0x83;
}

/// Timeout for vendor requests on EP0 (ms).
pub const CONTROL_TIMEOUT_MS: u32 = 1000;

/// Timeout for bulk transfers (ms).
pub const BULK_TIMEOUT_MS: u32 = 250;

/// Format a `vendor:product` string for use with `lsusb -d`.
#[must_use]
pub fn lsusb_filter() -> String {
    format!("{VENDOR_ID:04x}:{PRODUCT_ID:04x}")
}
