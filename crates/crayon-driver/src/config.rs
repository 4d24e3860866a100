//! Session configuration

use crate::loading::LoadConfig;
use crayon_chip::memory::{TILE_HEIGHT, TILE_WIDTH};
use crayon_chip::request::PROCESSING_SETTLE_MS;
use std::time::Duration;

/// Configuration of an [`AcceleratorSession`](crate::AcceleratorSession)
///
/// Defaults describe the reference board: a 320×240 memory tile, an 8 ms
/// settle delay and three output labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Input tile width enforced by the accelerator memory
    pub tile_width: usize,

    /// Input tile height enforced by the accelerator memory
    pub tile_height: usize,

    /// Fixed settle delay after every start request
    pub settle_delay: Duration,

    /// Number of output maps per tile
    pub labels: usize,

    /// Bulk loader settings for `load_configuration`
    pub load: LoadConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tile_width: TILE_WIDTH,
            tile_height: TILE_HEIGHT,
            settle_delay: Duration::from_millis(PROCESSING_SETTLE_MS),
            labels: 3,
            load: LoadConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Reference configuration with `labels` output maps
    pub fn with_labels(labels: usize) -> Self {
        Self {
            labels,
            ..Self::default()
        }
    }

    /// Same configuration with another settle delay
    #[must_use]
    pub const fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Same configuration without any settle delay, for simulated transports
    #[must_use]
    pub fn immediate(mut self) -> Self {
        self.settle_delay = Duration::ZERO;
        self.load = LoadConfig::immediate(self.load.chunk_size);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_defaults() {
        let config = SessionConfig::default();
        assert_eq!((config.tile_width, config.tile_height), (320, 240));
        assert_eq!(config.settle_delay, Duration::from_millis(8));
        assert_eq!(config.labels, 3);
    }

    #[test]
    fn test_immediate_clears_delays() {
        let config = SessionConfig::with_labels(2).immediate();
        assert_eq!(config.labels, 2);
        assert!(config.settle_delay.is_zero());
        assert!(config.load.parameter_settle.is_zero());
        assert_eq!(config.load.chunk_size, 65_536);
    }
}
