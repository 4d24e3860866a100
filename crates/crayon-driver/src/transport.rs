//! Transport abstraction
//!
//! The accelerator is reached through a byte pipe with fixed-size payloads
//! and a side channel of 16-bit control requests. There is no flow control
//! and, on the reference bridge, no way to ask whether a result is ready.

use crate::error::Result;
use std::fmt::{self, Debug};

/// Byte-oriented link to the accelerator
///
/// Every operation blocks until it completes. A transport is owned by exactly
/// one session for its lifetime.
pub trait Transport: Debug + Send {
    /// Send exactly `tx_payload()` bytes
    ///
    /// # Errors
    ///
    /// Returns a transport error if `data` has the wrong length or the
    /// transfer fails or is short.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive one payload into `buffer`, returning the number of bytes read
    ///
    /// `buffer` must hold at least `rx_payload()` bytes.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the transfer fails.
    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Raise a control request carrying `code`
    ///
    /// # Errors
    ///
    /// Returns a transport error if the request is not accepted.
    fn control_request(&mut self, code: u16) -> Result<()>;

    /// Bytes moved by every send
    fn tx_payload(&self) -> usize;

    /// Bytes moved by every receive
    fn rx_payload(&self) -> usize;

    /// Readiness probe for acknowledged waits
    ///
    /// `None` when the transport cannot tell, which is the case for the
    /// reference bridge.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the probe itself fails.
    fn poll_ready(&mut self) -> Result<Option<bool>> {
        Ok(None)
    }

    /// Reset the link and the accelerator interface
    ///
    /// # Errors
    ///
    /// Returns a transport error if the reset request fails.
    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    /// Transport type for logging
    fn transport_type(&self) -> TransportType;
}

/// Transport type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// FX2-LP bridge through Linux usbfs
    Usbfs,

    /// Simulated accelerator, no hardware required
    Software,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usbfs => write!(f, "usbfs"),
            Self::Software => write!(f, "Software (simulated CrayOn)"),
        }
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        (**self).send(data)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize> {
        (**self).receive(buffer)
    }

    fn control_request(&mut self, code: u16) -> Result<()> {
        (**self).control_request(code)
    }

    fn tx_payload(&self) -> usize {
        (**self).tx_payload()
    }

    fn rx_payload(&self) -> usize {
        (**self).rx_payload()
    }

    fn poll_ready(&mut self) -> Result<Option<bool>> {
        (**self).poll_ready()
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn transport_type(&self) -> TransportType {
        (**self).transport_type()
    }
}
