//! FX2-LP bridge transport over Linux usbfs
//!
//! Talks to the bridge through its `/dev/bus/usb/BBB/DDD` node with the
//! usbfs ioctls, no libusb required.
//!
//! ```text
//! send(data)          : vendor 0x80 (arm OUT)  → bulk OUT  EP 0x06, tx_payload bytes
//! receive(buf)        : vendor 0x81 (arm IN)   → bulk IN   EP 0x82, rx_payload bytes
//! control_request(c)  : vendor 0x82, wValue = c
//! reset()             : vendor 0x83
//! ```
//!
//! The bridge cannot report whether the FPGA has finished, so
//! [`Transport::poll_ready`] keeps its default `None`.

// usbfs ioctls need exact C layouts and integer casts
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use crate::discovery::BridgeInfo;
use crate::error::{CrayonError, Result};
use crate::transport::{Transport, TransportType};
use crayon_chip::memory::{RX_PAYLOAD, TX_PAYLOAD};
use crayon_chip::usb;
use rustix::fs::FileType;
use std::fs::{File, OpenOptions};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

/// Character device major of usbfs nodes (`USB_DEVICE_MAJOR`)
const USB_DEVICE_MAJOR: u32 = 189;

/// usbfs ioctl numbers (from `linux/usbdevice_fs.h`)
///
/// Calculated as `_IOC(dir, 'U', nr, size)` =
/// `(dir << 30) | (size << 16) | (type << 8) | nr`.
mod ioctls {
    use std::os::raw::c_ulong;

    const IOC_WRITE: c_ulong = 1;
    const IOC_READ: c_ulong = 2;

    const fn ioc(dir: c_ulong, nr: u8, size: usize) -> c_ulong {
        (dir << 30) | ((size as c_ulong) << 16) | ((b'U' as c_ulong) << 8) | (nr as c_ulong)
    }

    pub const USBDEVFS_CONTROL: c_ulong = ioc(
        IOC_READ | IOC_WRITE,
        0,
        std::mem::size_of::<super::UsbCtrlTransfer>(),
    );
    pub const USBDEVFS_BULK: c_ulong = ioc(
        IOC_READ | IOC_WRITE,
        2,
        std::mem::size_of::<super::UsbBulkTransfer>(),
    );
    pub const USBDEVFS_CLAIMINTERFACE: c_ulong =
        ioc(IOC_READ, 15, std::mem::size_of::<std::os::raw::c_uint>());
    pub const USBDEVFS_RELEASEINTERFACE: c_ulong =
        ioc(IOC_READ, 16, std::mem::size_of::<std::os::raw::c_uint>());
}

/// `struct usbdevfs_ctrltransfer`
#[repr(C)]
#[derive(Debug)]
struct UsbCtrlTransfer {
    request_type: u8,
    request: u8,
    value: u16,
    index: u16,
    length: u16,
    timeout: u32,
    data: *mut libc::c_void,
}

/// `struct usbdevfs_bulktransfer`
#[repr(C)]
#[derive(Debug)]
struct UsbBulkTransfer {
    ep: u32,
    len: u32,
    timeout: u32,
    data: *mut libc::c_void,
}

/// Bridge transport through a usbfs device node
#[derive(Debug)]
pub struct UsbfsTransport {
    file: File,
    path: PathBuf,
    tx_payload: usize,
    rx_payload: usize,
}

impl UsbfsTransport {
    /// Open a discovered bridge
    ///
    /// Claims interface 0 and resets the bridge FIFOs.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be opened (usually permissions),
    /// is not a usbfs character device, the interface is busy, or the reset
    /// is rejected.
    pub fn open(info: &BridgeInfo) -> Result<Self> {
        Self::open_path(info.path())
    }

    /// Open a bridge by usbfs node path
    ///
    /// # Errors
    ///
    /// See [`UsbfsTransport::open`].
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Opening bridge {}", path.display());

        if !path.exists() {
            return Err(CrayonError::device_not_found(path.display().to_string()));
        }

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        check_usbfs_node(&file, path)?;

        let mut transport = Self {
            file,
            path: path.to_path_buf(),
            tx_payload: TX_PAYLOAD,
            rx_payload: RX_PAYLOAD,
        };
        transport.claim_interface()?;

        tracing::info!("Configuring the FX2-LP controller at {}", path.display());
        transport.vendor_request(usb::vendor::RESET, 0)?;

        Ok(transport)
    }

    /// Override the bulk payload sizes
    #[must_use]
    pub const fn with_payloads(mut self, tx_payload: usize, rx_payload: usize) -> Self {
        self.tx_payload = tx_payload;
        self.rx_payload = rx_payload;
        self
    }

    /// usbfs node path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    fn claim_interface(&mut self) -> Result<()> {
        let mut interface: std::os::raw::c_uint = usb::INTERFACE;

        // SAFETY: USBDEVFS_CLAIMINTERFACE reads one c_uint through the pointer.
        // (1) fd is an open usbfs node owned by self; (2) interface lives for the call.
        let ret = unsafe {
            libc::ioctl(
                self.fd(),
                ioctls::USBDEVFS_CLAIMINTERFACE as _,
                &raw mut interface,
            )
        };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            return Err(CrayonError::transport(format!(
                "failed to claim interface {}: {err}",
                usb::INTERFACE
            )));
        }
        Ok(())
    }

    fn vendor_request(&mut self, request: u8, value: u16) -> Result<()> {
        let mut ctrl = UsbCtrlTransfer {
            request_type: usb::VENDOR_REQUEST_TYPE,
            request,
            value,
            index: 0,
            length: 0,
            timeout: usb::CONTROL_TIMEOUT_MS,
            data: std::ptr::null_mut(),
        };

        // SAFETY: USBDEVFS_CONTROL reads ctrl and, with length 0, touches no data buffer.
        // (1) fd is an open usbfs node; (2) ctrl layout matches usbdevfs_ctrltransfer.
        let ret = unsafe { libc::ioctl(self.fd(), ioctls::USBDEVFS_CONTROL as _, &raw mut ctrl) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            return Err(CrayonError::transport(format!(
                "vendor request {request:#04x} (value {value}) failed: {err}"
            )));
        }
        Ok(())
    }

    fn bulk(&mut self, endpoint: u8, data: *mut libc::c_void, len: usize) -> Result<usize> {
        let len_u32 = u32::try_from(len).map_err(|_| {
            CrayonError::transport(format!("bulk transfer of {len} bytes too large"))
        })?;
        let mut bulk = UsbBulkTransfer {
            ep: u32::from(endpoint),
            len: len_u32,
            timeout: usb::BULK_TIMEOUT_MS,
            data,
        };

        // SAFETY: USBDEVFS_BULK moves at most `len` bytes through bulk.data.
        // (1) fd is an open usbfs node; (2) data points to a live buffer of at least
        // `len` bytes, exclusively borrowed by the caller for the call's duration.
        let ret = unsafe { libc::ioctl(self.fd(), ioctls::USBDEVFS_BULK as _, &raw mut bulk) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            return Err(CrayonError::transport(format!(
                "bulk transfer on endpoint {endpoint:#04x} failed: {err}"
            )));
        }
        Ok(ret as usize)
    }
}

impl Transport for UsbfsTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != self.tx_payload {
            return Err(CrayonError::transport(format!(
                "send of {} bytes, payload is {}",
                data.len(),
                self.tx_payload
            )));
        }

        self.vendor_request(usb::vendor::ARM_SEND, 0)?;
        // The kernel only reads from OUT buffers.
        let written = self.bulk(usb::EP_OUT, data.as_ptr().cast_mut().cast(), data.len())?;
        if written != data.len() {
            return Err(CrayonError::transport(format!(
                "bulk write incomplete: {written} of {} bytes",
                data.len()
            )));
        }
        Ok(())
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize> {
        if buffer.len() < self.rx_payload {
            return Err(CrayonError::transport(format!(
                "receive buffer of {} bytes, payload is {}",
                buffer.len(),
                self.rx_payload
            )));
        }

        self.vendor_request(usb::vendor::ARM_RECEIVE, 0)?;
        let len = self.rx_payload;
        self.bulk(usb::EP_IN, buffer.as_mut_ptr().cast(), len)
    }

    fn control_request(&mut self, code: u16) -> Result<()> {
        self.vendor_request(usb::vendor::REQUEST, code)
    }

    fn tx_payload(&self) -> usize {
        self.tx_payload
    }

    fn rx_payload(&self) -> usize {
        self.rx_payload
    }

    fn reset(&mut self) -> Result<()> {
        tracing::info!("Resetting bridge {}", self.path.display());
        self.vendor_request(usb::vendor::RESET, 0)
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Usbfs
    }
}

impl Drop for UsbfsTransport {
    fn drop(&mut self) {
        let mut interface: std::os::raw::c_uint = usb::INTERFACE;
        // SAFETY: same contract as the claim in claim_interface; failure is ignored on close.
        unsafe {
            libc::ioctl(
                self.fd(),
                ioctls::USBDEVFS_RELEASEINTERFACE as _,
                &raw mut interface,
            );
        }
        tracing::info!("Closing bridge {}", self.path.display());
    }
}

/// Reject anything but a usbfs character device before issuing ioctls
fn check_usbfs_node(file: &File, path: &Path) -> Result<()> {
    let stat = rustix::fs::fstat(file).map_err(std::io::Error::from)?;
    let file_type = FileType::from_raw_mode(stat.st_mode);
    if file_type != FileType::CharacterDevice {
        return Err(CrayonError::transport(format!(
            "{} is a {file_type:?}, not a usbfs device node",
            path.display()
        )));
    }
    let major = rustix::fs::major(stat.st_rdev);
    if major != USB_DEVICE_MAJOR {
        return Err(CrayonError::transport(format!(
            "{} has device major {major}, usbfs nodes use {USB_DEVICE_MAJOR}",
            path.display()
        )));
    }
    Ok(())
}
