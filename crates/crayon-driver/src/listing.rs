//! Hexadecimal configuration listings
//!
//! Program and parameter images are shipped as line-oriented listings of
//! 16-bit words:
//!
//! ```text
//! ; generated by the training flow
//! memory_initialization_radix=16;
//! memory_initialization_vector=
//! 1A2B,3C4D,
//! 0007;
//! ```
//!
//! Lines starting with `;` or `m` carry metadata and are skipped. Every other
//! line is split on `,` and `;`; each non-empty token is one word, emitted
//! big-endian.

use crate::error::{CrayonError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Accelerator memory region a listing is loaded into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryTarget {
    /// µ-program memory
    Program,
    /// Network parameter (kernel) memory
    Parameters,
}

impl fmt::Display for MemoryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Program => write!(f, "program"),
            Self::Parameters => write!(f, "parameters"),
        }
    }
}

impl FromStr for MemoryTarget {
    type Err = CrayonError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "program" | "p" => Ok(Self::Program),
            "parameters" | "k" => Ok(Self::Parameters),
            other => Err(CrayonError::config(format!(
                "Unsupported loading target: {other:?}"
            ))),
        }
    }
}

/// Encoded configuration image ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigImage {
    /// Destination region
    pub target: MemoryTarget,
    /// Big-endian word stream
    pub data: Bytes,
}

impl ConfigImage {
    /// Parse listing text
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the line of the first malformed
    /// token.
    pub fn parse(text: &str, target: MemoryTarget) -> Result<Self> {
        let data = parse_listing(text)?;
        tracing::debug!("Parsed {target} listing: {} words", data.len() / 2);
        Ok(Self { target, data })
    }

    /// Read and parse a listing file
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a configuration
    /// error for malformed content.
    pub fn from_file(path: impl AsRef<Path>, target: MemoryTarget) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Reading {target} listing from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, target)
    }

    /// Number of encoded bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for a listing without words
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Parse listing text into its big-endian byte stream
///
/// # Errors
///
/// Returns a configuration error for a token that is not hexadecimal or does
/// not fit 16 bits.
pub fn parse_listing(text: &str) -> Result<Bytes> {
    let mut out = BytesMut::new();

    for (number, line) in text.lines().enumerate() {
        if line.starts_with(';') || line.starts_with('m') {
            continue;
        }
        for token in line.split([',', ';']).map(str::trim).filter(|t| !t.is_empty()) {
            let word = u16::from_str_radix(token, 16).map_err(|e| {
                CrayonError::config(format!(
                    "line {}: invalid 16-bit hex word {token:?}: {e}",
                    number + 1
                ))
            })?;
            out.put_u16(word);
        }
    }

    Ok(out.freeze())
}
