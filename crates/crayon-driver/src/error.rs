//! Error types for CrayOn driver operations

use thiserror::Error;

/// Result type alias for CrayOn operations
pub type Result<T> = std::result::Result<T, CrayonError>;

/// Errors that can occur while configuring or driving the accelerator
///
/// Every variant is fatal for the operation that raised it. The driver never
/// retries and never continues a frame after an error.
#[derive(Debug, Error)]
pub enum CrayonError {
    /// Malformed descriptor, listing, or incompatible configuration
    #[error("Configuration error: {reason}")]
    Config {
        /// Reason for failure
        reason: String,
    },

    /// Crop, tile, frame size or label outside bounds
    #[error("Out of bounds: {reason}")]
    Bounds {
        /// Reason for failure
        reason: String,
    },

    /// Send, receive or control request failed
    #[error("Transport failed: {reason}")]
    Transport {
        /// Reason for failure
        reason: String,
    },

    /// Acknowledged wait elapsed without a ready signal
    #[error("Accelerator not ready after {duration_ms}ms")]
    Timeout {
        /// Elapsed wait in milliseconds
        duration_ms: u64,
    },

    /// I/O error on a listing or device file
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// No accelerator bridge detected on the system
    #[error("No CrayOn bridge detected")]
    NoDevicesFound,

    /// No bridge matches the requested product id
    #[error("Bridge not found: {id}")]
    DeviceNotFound {
        /// Requested product id
        id: String,
    },
}

impl CrayonError {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create a bounds error
    pub fn bounds(reason: impl Into<String>) -> Self {
        Self::Bounds {
            reason: reason.into(),
        }
    }

    /// Create a transport error
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Create a device not found error
    pub fn device_not_found(id: impl Into<String>) -> Self {
        Self::DeviceNotFound { id: id.into() }
    }
}
