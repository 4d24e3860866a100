//! Software (simulated CrayOn) transport
//!
//! Implements [`Transport`] with a deterministic model of the FPGA so that the
//! whole tiling, transport and reassembly path runs without hardware:
//!
//! 1. **CI without a board**: every session test drives this backend.
//! 2. **Protocol checks**: it rejects sends of the wrong size, commits without
//!    a payload, unknown request codes and reads with no result pending.
//! 3. **Timing checks**: with a simulated latency, a read issued before the
//!    result is ready fails loudly instead of returning stale data, and the
//!    readiness probe supports [`AcknowledgedWait`](crate::AcknowledgedWait).
//!
//! ## Model
//!
//! ```text
//! tile (complemented)  →  decode  →  stride × stride mean pool  →  per label:
//!   label % 3 == 0: mean
//!   label % 3 == 1: 255 - mean
//!   label % 3 == 2: mean / 2
//! → encode (complement) → last row of every map overwritten with 0xFF
//! ```
//!
//! The corrupted last row mirrors the boundary artifact of the real board.

use crate::arch::ArchitectureDescriptor;
use crate::error::{CrayonError, Result};
use crate::geometry::TilingGeometry;
use crate::transport::{Transport, TransportType};
use crayon_chip::memory::{COMPLEMENT_BIAS, RX_PAYLOAD, TX_PAYLOAD};
use crayon_chip::request;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Byte written over the last row of every simulated output map
pub const ARTIFACT_BYTE: u8 = 0xFF;

/// Transfer counters of a [`SoftwareAccelerator`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoftwareStats {
    /// Completed sends
    pub sends: usize,
    /// Completed receives
    pub receives: usize,
    /// Control request codes, in order
    pub requests: Vec<u16>,
}

#[derive(Debug)]
struct PendingResult {
    payload: Vec<u8>,
    ready_at: Instant,
}

/// Simulated accelerator
#[derive(Debug)]
pub struct SoftwareAccelerator {
    geometry: TilingGeometry,
    labels: usize,
    tx_payload: usize,
    rx_payload: usize,
    latency: Duration,

    last_send: Option<Vec<u8>>,
    pending: Option<PendingResult>,

    program: Vec<u8>,
    parameters: BTreeMap<usize, Vec<u8>>,

    fail_send_at: Option<usize>,
    stats: SoftwareStats,
}

impl SoftwareAccelerator {
    /// Simulate `arch` producing `labels` maps per tile
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the geometry is invalid on the board
    /// tile or the maps do not fit the receive payload.
    pub fn new(arch: &ArchitectureDescriptor, labels: usize) -> Result<Self> {
        let geometry = TilingGeometry::for_board(arch)?;
        Self::with_geometry(geometry, labels, TX_PAYLOAD, RX_PAYLOAD)
    }

    /// Simulate an arbitrary geometry and payload sizes
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the input tile does not match
    /// `tx_payload` or the maps do not fit `rx_payload`.
    pub fn with_geometry(
        geometry: TilingGeometry,
        labels: usize,
        tx_payload: usize,
        rx_payload: usize,
    ) -> Result<Self> {
        let (in_w, in_h) = geometry.tile_in();
        if in_w.checked_mul(in_h) != Some(tx_payload) {
            return Err(CrayonError::config(format!(
                "{in_w}×{in_h} tile does not match a {tx_payload} byte send payload"
            )));
        }
        if labels * geometry.channel_bytes() > rx_payload {
            return Err(CrayonError::config(format!(
                "{labels} maps of {} bytes exceed a {rx_payload} byte receive payload",
                geometry.channel_bytes()
            )));
        }

        let (out_w, out_h) = geometry.tile_out();
        info!(
            "SoftwareAccelerator: stride {}, {labels} labels, {out_w}×{out_h} maps",
            geometry.stride()
        );

        Ok(Self {
            geometry,
            labels,
            tx_payload,
            rx_payload,
            latency: Duration::ZERO,
            last_send: None,
            pending: None,
            program: Vec::new(),
            parameters: BTreeMap::new(),
            fail_send_at: None,
            stats: SoftwareStats::default(),
        })
    }

    /// Reference network `c9-p2-c9-p2-c9-p2-c9` with three labels
    #[allow(clippy::missing_panics_doc)]
    pub fn reference() -> Self {
        let arch = ArchitectureDescriptor::parse("c9-p2-c9-p2-c9-p2-c9")
            .expect("reference descriptor is valid");
        Self::new(&arch, 3).expect("reference geometry fits the board")
    }

    /// Simulate a processing latency after every start request
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make the `n`-th send (1-based) fail
    #[must_use]
    pub const fn fail_on_send(mut self, n: usize) -> Self {
        self.fail_send_at = Some(n);
        self
    }

    /// Transfer counters
    pub const fn stats(&self) -> &SoftwareStats {
        &self.stats
    }

    /// Last committed µ-program payload
    pub fn program(&self) -> &[u8] {
        &self.program
    }

    /// Committed parameter chunk `index`
    pub fn parameter_chunk(&self, index: usize) -> Option<&[u8]> {
        self.parameters.get(&index).map(Vec::as_slice)
    }

    /// Number of committed parameter chunks
    pub fn parameter_chunk_count(&self) -> usize {
        self.parameters.len()
    }

    fn process_tile(&mut self) -> Result<()> {
        let tile = self
            .last_send
            .as_ref()
            .ok_or_else(|| CrayonError::transport("start requested before any tile was sent"))?;

        let (in_w, _) = self.geometry.tile_in();
        let (out_w, out_h) = self.geometry.tile_out();
        let stride = self.geometry.stride();
        let map_bytes = self.geometry.channel_bytes();
        let mut payload = vec![0u8; self.rx_payload];

        for oy in 0..out_h {
            for ox in 0..out_w {
                let mut sum = 0usize;
                for dy in 0..stride {
                    let row = (oy * stride + dy) * in_w + ox * stride;
                    sum += tile[row..row + stride]
                        .iter()
                        .map(|&b| usize::from(b.wrapping_sub(COMPLEMENT_BIAS)))
                        .sum::<usize>();
                }
                let mean = u8::try_from(sum / (stride * stride)).unwrap_or(u8::MAX);

                for label in 0..self.labels {
                    let value = match label % 3 {
                        0 => mean,
                        1 => 255 - mean,
                        _ => mean / 2,
                    };
                    payload[label * map_bytes + oy * out_w + ox] =
                        value.wrapping_add(COMPLEMENT_BIAS);
                }
            }
        }

        for label in 0..self.labels {
            let last_row = label * map_bytes + (out_h - 1) * out_w;
            payload[last_row..last_row + out_w].fill(ARTIFACT_BYTE);
        }

        self.pending = Some(PendingResult {
            payload,
            ready_at: Instant::now() + self.latency,
        });
        Ok(())
    }

    fn commit(&mut self, code: u16) -> Result<()> {
        let payload = self
            .last_send
            .clone()
            .ok_or_else(|| CrayonError::transport(format!("commit {code} with no payload sent")))?;

        if code == request::COMMIT_PROGRAM {
            debug!("SoftwareAccelerator: program committed ({} bytes)", payload.len());
            self.program = payload;
        } else if let Some(index) = request::parameter_chunk_index(code) {
            debug!("SoftwareAccelerator: parameter chunk {index} committed");
            self.parameters.insert(index, payload);
        } else {
            return Err(CrayonError::transport(format!("unknown request code {code}")));
        }
        Ok(())
    }
}

impl Transport for SoftwareAccelerator {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.fail_send_at == Some(self.stats.sends + 1) {
            return Err(CrayonError::transport(format!(
                "simulated failure on send {}",
                self.stats.sends + 1
            )));
        }
        if data.len() != self.tx_payload {
            return Err(CrayonError::transport(format!(
                "send of {} bytes, payload is {}",
                data.len(),
                self.tx_payload
            )));
        }

        match &mut self.last_send {
            Some(buffer) => buffer.copy_from_slice(data),
            None => self.last_send = Some(data.to_vec()),
        }
        self.stats.sends += 1;
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

        let pending = self
            .pending
            .take()
            .ok_or_else(|| CrayonError::transport("receive with no result pending"))?;

        let now = Instant::now();
        if now < pending.ready_at {
            return Err(CrayonError::transport(format!(
                "result read {:?} before it was ready; settle delay too short",
                pending.ready_at - now
            )));
        }

        buffer[..self.rx_payload].copy_from_slice(&pending.payload);
        self.stats.receives += 1;
        Ok(self.rx_payload)
    }

    fn control_request(&mut self, code: u16) -> Result<()> {
        self.stats.requests.push(code);
        if code == request::START_PROCESSING {
            self.process_tile()
        } else {
            self.commit(code)
        }
    }

    fn tx_payload(&self) -> usize {
        self.tx_payload
    }

    fn rx_payload(&self) -> usize {
        self.rx_payload
    }

    fn poll_ready(&mut self) -> Result<Option<bool>> {
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|p| Instant::now() >= p.ready_at);
        Ok(Some(ready))
    }

    fn reset(&mut self) -> Result<()> {
        debug!("SoftwareAccelerator: reset");
        self.last_send = None;
        self.pending = None;
        Ok(())
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Software
    }
}
