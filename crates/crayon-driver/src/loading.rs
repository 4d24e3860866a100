//! Bulk configuration loading
//!
//! Uploads a µ-program or parameter image into accelerator memory. Every
//! transfer is one full (zero-padded) transport payload, committed with a
//! control request and a short settle delay. A program is a single payload;
//! parameters are cut into chunks whose request code carries the chunk index:
//!
//! ```text
//! program    : send image → request 2              → 10 ms
//! parameters : send chunk → request 1 + (index<<2) → 5 ms
//! ```
//!
//! Loading is all-or-nothing: the first failure aborts and nothing is
//! retried.

use crate::error::{CrayonError, Result};
use crate::listing::{ConfigImage, MemoryTarget};
use crate::transport::Transport;
use crayon_chip::request;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Loader configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadConfig {
    /// Parameter bytes per chunk, at most the transport send payload
    pub chunk_size: usize,

    /// Settle time after each program commit
    pub program_settle: Duration,

    /// Settle time after each parameter chunk commit
    pub parameter_settle: Duration,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            chunk_size: request::PARAMETER_CHUNK_BYTES,
            program_settle: Duration::from_millis(request::PROGRAM_SETTLE_MS),
            parameter_settle: Duration::from_millis(request::PARAMETER_SETTLE_MS),
        }
    }
}

impl LoadConfig {
    /// Configuration without settle delays, for simulated transports
    pub const fn immediate(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            program_settle: Duration::ZERO,
            parameter_settle: Duration::ZERO,
        }
    }
}

impl ConfigImage {
    /// Split the image into chunks of at most `chunk_size` bytes
    pub fn chunk(&self, chunk_size: usize) -> Vec<&[u8]> {
        self.data.chunks(chunk_size).collect()
    }
}

/// Configuration loader
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    config: LoadConfig,
}

impl ConfigLoader {
    /// Create loader with configuration
    pub const fn new(config: LoadConfig) -> Self {
        Self { config }
    }

    /// Loader configuration
    pub const fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Upload `image` through `transport`
    ///
    /// # Errors
    ///
    /// Returns a configuration error before any transfer if a program image
    /// exceeds the send payload, if the parameter chunk size is zero or
    /// exceeds the send payload, or if a parameter chunk index does not fit a
    /// request code. Returns the first transport error otherwise.
    pub fn load<T: Transport + ?Sized>(
        &self,
        image: &ConfigImage,
        transport: &mut T,
    ) -> Result<LoadMetrics> {
        let payload = transport.tx_payload();
        let (chunks, settle) = match image.target {
            MemoryTarget::Program => {
                if image.len() > payload {
                    return Err(CrayonError::config(format!(
                        "program of {} bytes exceeds the {payload} byte send payload",
                        image.len()
                    )));
                }
                let chunks = if image.is_empty() {
                    Vec::new()
                } else {
                    vec![&image.data[..]]
                };
                (chunks, self.config.program_settle)
            }
            MemoryTarget::Parameters => {
                let chunk_size = self.config.chunk_size;
                if chunk_size == 0 || chunk_size > payload {
                    return Err(CrayonError::config(format!(
                        "chunk size {chunk_size} must be 1 to {payload} bytes"
                    )));
                }
                (image.chunk(chunk_size), self.config.parameter_settle)
            }
        };
        let codes = commit_codes(image.target, chunks.len())?;

        if chunks.is_empty() {
            warn!("Empty {} image, nothing to load", image.target);
        }
        info!(
            "Loading {} bytes of {} in {} chunk(s) over {}",
            image.len(),
            image.target,
            chunks.len(),
            transport.transport_type()
        );

        let start = Instant::now();
        let mut metrics = LoadMetrics::new();
        let mut buffer = vec![0u8; payload];

        for (i, (chunk, code)) in chunks.iter().zip(codes).enumerate() {
            buffer[..chunk.len()].copy_from_slice(chunk);
            buffer[chunk.len()..].fill(0);

            transport.send(&buffer)?;
            transport.control_request(code)?;
            if !settle.is_zero() {
                std::thread::sleep(settle);
            }

            debug!("Chunk {i}: {} bytes, request {code}", chunk.len());
            metrics.chunks_transferred += 1;
            metrics.bytes_transferred += chunk.len();
        }

        metrics.duration = start.elapsed();
        metrics.throughput_mbps =
            calculate_throughput(metrics.bytes_transferred, metrics.duration.as_secs_f64());

        info!(
            "✅ {} loaded: {} bytes in {:?} ({:.2} MB/s)",
            image.target, metrics.bytes_transferred, metrics.duration, metrics.throughput_mbps
        );
        Ok(metrics)
    }
}

/// Commit request code of every chunk
fn commit_codes(target: MemoryTarget, chunks: usize) -> Result<Vec<u16>> {
    match target {
        MemoryTarget::Program => Ok(vec![request::COMMIT_PROGRAM; chunks]),
        MemoryTarget::Parameters => (0..chunks)
            .map(|i| {
                request::commit_parameters(i).ok_or_else(|| {
                    CrayonError::config(format!(
                        "parameter image needs {chunks} chunks, chunk {i} has no request code"
                    ))
                })
            })
            .collect(),
    }
}

/// Load operation metrics
#[derive(Debug, Clone)]
pub struct LoadMetrics {
    /// Image bytes transferred, padding excluded
    pub bytes_transferred: usize,

    /// Number of chunks transferred
    pub chunks_transferred: usize,

    /// Total duration, settle delays included
    pub duration: Duration,

    /// Throughput (MB/s)
    pub throughput_mbps: f64,
}

impl LoadMetrics {
    const fn new() -> Self {
        Self {
            bytes_transferred: 0,
            chunks_transferred: 0,
            duration: Duration::from_secs(0),
            throughput_mbps: 0.0,
        }
    }
}

/// Calculate throughput in MB/s
fn calculate_throughput(bytes: usize, seconds: f64) -> f64 {
    if seconds == 0.0 {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let megabytes = bytes as f64 / 1_048_576.0;
    megabytes / seconds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SoftwareAccelerator;
    use bytes::Bytes;
    use crayon_chip::memory::TX_PAYLOAD;

    fn image(len: usize, target: MemoryTarget) -> ConfigImage {
        #[allow(clippy::cast_possible_truncation)]
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8 + 1).collect();
        ConfigImage {
            target,
            data: Bytes::from(data),
        }
    }

    #[test]
    fn test_chunk_sizes() {
        let image = image(150_000, MemoryTarget::Parameters);
        let sizes: Vec<usize> = image.chunk(65_536).iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![65_536, 65_536, 18_928]);
    }

    #[test]
    fn test_parameters_load_pads_last_chunk() {
        let image = image(150_000, MemoryTarget::Parameters);
        let mut board = SoftwareAccelerator::reference();

        let metrics = ConfigLoader::new(LoadConfig::immediate(65_536))
            .load(&image, &mut board)
            .unwrap();

        assert_eq!(metrics.chunks_transferred, 3);
        assert_eq!(metrics.bytes_transferred, 150_000);
        assert_eq!(board.stats().requests, vec![1, 5, 9]);

        let last = board.parameter_chunk(2).unwrap();
        assert_eq!(last.len(), TX_PAYLOAD);
        assert_eq!(&last[..18_928], &image.data[131_072..]);
        assert!(last[18_928..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_program_load_uses_fixed_code() {
        let image = image(1000, MemoryTarget::Program);
        let mut board = SoftwareAccelerator::reference();

        ConfigLoader::new(LoadConfig::immediate(65_536))
            .load(&image, &mut board)
            .unwrap();

        assert_eq!(board.stats().requests, vec![request::COMMIT_PROGRAM]);
        assert_eq!(&board.program()[..1000], &image.data[..]);
    }

    #[test]
    fn test_program_is_one_payload() {
        let image = image(70_000, MemoryTarget::Program);
        let mut board = SoftwareAccelerator::reference();

        let metrics = ConfigLoader::new(LoadConfig::immediate(65_536))
            .load(&image, &mut board)
            .unwrap();

        assert_eq!(metrics.chunks_transferred, 1);
        assert_eq!(metrics.bytes_transferred, 70_000);
        assert_eq!(board.stats().requests, vec![request::COMMIT_PROGRAM]);
        assert_eq!(&board.program()[..70_000], &image.data[..]);
        assert!(board.program()[70_000..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_oversized_program_rejected() {
        let image = image(TX_PAYLOAD + 1, MemoryTarget::Program);
        let mut board = SoftwareAccelerator::reference();

        let err = ConfigLoader::default().load(&image, &mut board).unwrap_err();
        assert!(matches!(err, CrayonError::Config { .. }));
        assert_eq!(board.stats().sends, 0);
    }

    #[test]
    fn test_program_fills_payload() {
        let image = image(TX_PAYLOAD, MemoryTarget::Program);
        let mut board = SoftwareAccelerator::reference();

        ConfigLoader::new(LoadConfig::immediate(65_536))
            .load(&image, &mut board)
            .unwrap();
        assert_eq!(board.program(), &image.data[..]);
    }

    #[test]
    fn test_chunk_size_validation() {
        let image = image(10, MemoryTarget::Parameters);
        let mut board = SoftwareAccelerator::reference();

        for bad in [0, TX_PAYLOAD + 1] {
            let err = ConfigLoader::new(LoadConfig::immediate(bad))
                .load(&image, &mut board)
                .unwrap_err();
            assert!(matches!(err, CrayonError::Config { .. }));
        }
        assert_eq!(board.stats().sends, 0);
    }

    #[test]
    fn test_too_many_parameter_chunks() {
        assert!(commit_codes(MemoryTarget::Parameters, 16_384).is_ok());
        assert!(commit_codes(MemoryTarget::Parameters, 16_385).is_err());
    }

    #[test]
    fn test_transport_failure_aborts() {
        let image = image(150_000, MemoryTarget::Parameters);
        let mut board = SoftwareAccelerator::reference().fail_on_send(2);

        let err = ConfigLoader::new(LoadConfig::immediate(65_536))
            .load(&image, &mut board)
            .unwrap_err();
        assert!(matches!(err, CrayonError::Transport { .. }));
        assert_eq!(board.parameter_chunk_count(), 1);
    }

    #[test]
    fn test_default_config() {
        let config = LoadConfig::default();
        assert_eq!(config.chunk_size, 65_536);
        assert_eq!(config.parameter_settle, Duration::from_millis(5));
    }

    #[test]
    fn test_throughput_calculation() {
        let throughput = calculate_throughput(1_048_576, 1.0);
        assert!((throughput - 1.0).abs() < 0.01);
    }
}
