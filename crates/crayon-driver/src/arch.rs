//! Architecture descriptor parsing
//!
//! The network loaded into the FPGA is described by a dash-separated list of
//! layers such as `c9-p2-c9-p2-c9-p2-c9`: `c<k>` is a `k × k` convolution,
//! `p<s>` a pooling stage with stride `s`.

use crate::error::{CrayonError, Result};
use std::fmt;
use std::str::FromStr;

/// Layer kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Convolution; the parameter is the kernel size
    Convolution,
    /// Pooling; the parameter is the stride
    Pool,
}

impl LayerKind {
    const fn tag(self) -> char {
        match self {
            Self::Convolution => 'c',
            Self::Pool => 'p',
        }
    }
}

/// One stage of the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerSpec {
    /// Stage kind
    pub kind: LayerKind,
    /// Kernel size or pooling stride, always positive
    pub param: usize,
}

/// Ordered, immutable list of layer specs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchitectureDescriptor {
    layers: Vec<LayerSpec>,
}

impl ArchitectureDescriptor {
    /// Parse a descriptor string
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty descriptor, an empty token,
    /// an unknown leading character, or a missing, non-numeric or zero
    /// parameter.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let layers = descriptor
            .split('-')
            .map(parse_layer)
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("Parsed descriptor {descriptor}: {} layers", layers.len());
        Ok(Self { layers })
    }

    /// Layers in network order
    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }
}

fn parse_layer(token: &str) -> Result<LayerSpec> {
    let mut chars = token.chars();
    let kind = match chars.next() {
        Some('c') => LayerKind::Convolution,
        Some('p') => LayerKind::Pool,
        _ => {
            return Err(CrayonError::config(format!(
                "Invalid layer description: {token:?}"
            )))
        }
    };

    let param = chars
        .as_str()
        .parse::<usize>()
        .ok()
        .filter(|&p| p > 0)
        .ok_or_else(|| {
            CrayonError::config(format!(
                "Invalid layer description: {token:?} needs a positive integer parameter"
            ))
        })?;

    Ok(LayerSpec { kind, param })
}

impl FromStr for ArchitectureDescriptor {
    type Err = CrayonError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for LayerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.tag(), self.param)
    }
}

impl fmt::Display for ArchitectureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, layer) in self.layers.iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            write!(f, "{layer}")?;
        }
        Ok(())
    }
}
