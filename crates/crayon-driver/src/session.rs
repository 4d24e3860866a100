//! Accelerator session: the per-frame protocol driver
//!
//! A session owns one transport and every buffer the exchange needs. For each
//! grid cell, in row-major order:
//!
//! ```text
//! extract tile → complement → send → request 0 → wait policy
//!     → receive (all labels concatenated)
//!     → per label: load map → complement → boundary-row fix → place
//! ```
//!
//! Tile, receive and channel buffers are allocated when the geometry, label
//! count or input size changes, never per tile. The first failure aborts
//! [`AcceleratorSession::process`]; nothing is retried.

use crate::arch::ArchitectureDescriptor;
use crate::config::SessionConfig;
use crate::error::{CrayonError, Result};
use crate::frame::Frame;
use crate::geometry::TilingGeometry;
use crate::grid::{extract_tile, Grid};
use crate::listing::{ConfigImage, MemoryTarget};
use crate::loading::{ConfigLoader, LoadMetrics};
use crate::reassembly::OutputChannels;
use crate::transport::Transport;
use crate::wait::{FixedDelay, WaitPolicy};
use crayon_chip::request::START_PROCESSING;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Metrics of one [`AcceleratorSession::process`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessMetrics {
    /// Grid cells processed
    pub cells: usize,
    /// Bytes sent, one full tile per cell
    pub bytes_sent: usize,
    /// Bytes received, one full payload per cell
    pub bytes_received: usize,
    /// Wall time of the whole frame
    pub duration: Duration,
}

/// Long-lived session driving one accelerator
#[derive(Debug)]
pub struct AcceleratorSession<T: Transport> {
    transport: T,
    arch: ArchitectureDescriptor,
    geometry: TilingGeometry,
    grid: Grid,
    wait: Box<dyn WaitPolicy>,
    loader: ConfigLoader,

    input: Frame,
    tile_in: Frame,
    tile_out: Frame,
    rx: Vec<u8>,
    channels: OutputChannels,
}

impl<T: Transport> AcceleratorSession<T> {
    /// Create a session running `arch` over `transport`
    ///
    /// The wait policy starts as a [`FixedDelay`] of `config.settle_delay`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the geometry is invalid on the
    /// configured tile, the tile does not match the transport's send payload,
    /// or the label maps do not fit its receive payload.
    pub fn new(transport: T, arch: ArchitectureDescriptor, config: SessionConfig) -> Result<Self> {
        let geometry = TilingGeometry::new(&arch, config.tile_width, config.tile_height)?;
        check_payloads(&transport, &geometry, config.labels)?;

        info!(
            "Session on {}: {arch}, stride {}, margin {}, overlap {}, {} labels",
            transport.transport_type(),
            geometry.stride(),
            geometry.margin(),
            geometry.overlap(),
            config.labels
        );

        let rx = vec![0u8; transport.rx_payload()];
        Ok(Self {
            transport,
            arch,
            geometry,
            grid: Grid::default(),
            wait: Box::new(FixedDelay(config.settle_delay)),
            loader: ConfigLoader::new(config.load),
            input: Frame::default(),
            tile_in: Frame::new(geometry.tile_in().0, geometry.tile_in().1),
            tile_out: Frame::new(geometry.tile_out().0, geometry.tile_out().1),
            rx,
            channels: OutputChannels::new(config.labels, 0, 0),
        })
    }

    /// Switch to another network on the same tile size
    ///
    /// Rebuilds the geometry, the tile buffers and, if a frame is loaded, the
    /// grid and zero-filled channels. On error the session is unchanged.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the new geometry is invalid or its
    /// maps no longer fit the receive payload.
    pub fn set_arch(&mut self, arch: ArchitectureDescriptor) -> Result<()> {
        let (tile_width, tile_height) = self.geometry.tile_in();
        let geometry = TilingGeometry::new(&arch, tile_width, tile_height)?;
        check_payloads(&self.transport, &geometry, self.channels.len())?;

        info!(
            "Architecture {arch}: stride {}, margin {}, overlap {}",
            geometry.stride(), geometry.margin(), geometry.overlap()
        );

        self.arch = arch;
        self.geometry = geometry;
        self.tile_out.realloc(geometry.tile_out().0, geometry.tile_out().1);
        self.regrid();
        Ok(())
    }

    /// Change the number of output maps per tile
    ///
    /// Channels are replaced by `labels` zero-filled frames of the current size.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `labels` is zero or the maps do not
    /// fit the receive payload.
    pub fn set_label_count(&mut self, labels: usize) -> Result<()> {
        check_payloads(&self.transport, &self.geometry, labels)?;
        debug!("Label count {} → {labels}", self.channels.len());
        self.channels.set_label_count(labels);
        Ok(())
    }

    /// Wait a fixed `delay` after every start request
    pub fn set_settle_delay(&mut self, delay: Duration) {
        self.wait = Box::new(FixedDelay(delay));
    }

    /// Replace the wait policy
    pub fn set_wait_policy(&mut self, policy: impl WaitPolicy + 'static) {
        debug!("Wait policy: {policy:?}");
        self.wait = Box::new(policy);
    }

    /// Take `frame` as the next input
    ///
    /// Recomputes the grid and reallocates zero-filled channels.
    pub fn push(&mut self, frame: Frame) {
        self.input = frame;
        self.regrid();
    }

    /// Run every grid cell of the current input through the accelerator
    ///
    /// # Errors
    ///
    /// Returns the first transport, wait or bounds error; the channels then
    /// hold a partially processed frame.
    pub fn process(&mut self) -> Result<ProcessMetrics> {
        let start = Instant::now();
        let grid = self.grid;
        let geometry = self.geometry;
        let labels = self.channels.len();
        let map_bytes = geometry.channel_bytes();
        let mut metrics = ProcessMetrics {
            cells: 0,
            bytes_sent: 0,
            bytes_received: 0,
            duration: Duration::ZERO,
        };

        for (i, j) in grid.cells() {
            extract_tile(&geometry, &self.input, i, j, &mut self.tile_in)?;
            self.tile_in.complement();

            self.transport.send(self.tile_in.as_bytes())?;
            self.transport.control_request(START_PROCESSING)?;
            self.wait.settle(&mut self.transport)?;

            let received = self.transport.receive(&mut self.rx)?;
            if received < self.rx.len() {
                return Err(CrayonError::transport(format!(
                    "short read on cell ({i}, {j}): {received} of {} bytes",
                    self.rx.len()
                )));
            }

            for label in 0..labels {
                let offset = label * map_bytes;
                self.tile_out.load(&self.rx[offset..offset + map_bytes])?;
                self.tile_out.complement();
                self.channels
                    .place_tile(&geometry, &grid, i, j, label, &mut self.tile_out)?;
            }

            debug!("Cell ({i}, {j}) done");
            metrics.cells += 1;
            metrics.bytes_sent += self.tile_in.len();
            metrics.bytes_received += received;
        }

        metrics.duration = start.elapsed();
        info!(
            "Frame {}×{}: {} cells in {:?}",
            self.input.width(),
            self.input.height(),
            metrics.cells,
            metrics.duration
        );
        Ok(metrics)
    }

    /// Output channel of `label`
    ///
    /// # Errors
    ///
    /// Returns a bounds error for an unknown label.
    pub fn pull(&self, label: usize) -> Result<&Frame> {
        self.channels.get(label)
    }

    /// All output channels
    pub const fn channels(&self) -> &OutputChannels {
        &self.channels
    }

    /// Current geometry
    pub const fn geometry(&self) -> &TilingGeometry {
        &self.geometry
    }

    /// Grid of the current input
    pub const fn grid(&self) -> Grid {
        self.grid
    }

    /// Current architecture
    pub const fn arch(&self) -> &ArchitectureDescriptor {
        &self.arch
    }

    /// Current input frame
    pub const fn input(&self) -> &Frame {
        &self.input
    }

    /// Parse a hex listing and upload it to `target`
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a malformed listing, or any loader
    /// error.
    pub fn load_configuration(
        &mut self,
        listing: &str,
        target: MemoryTarget,
    ) -> Result<LoadMetrics> {
        let image = ConfigImage::parse(listing, target)?;
        self.load_image(&image)
    }

    /// Upload an already parsed configuration image
    ///
    /// # Errors
    ///
    /// See [`ConfigLoader::load`].
    pub fn load_image(&mut self, image: &ConfigImage) -> Result<LoadMetrics> {
        self.loader.load(image, &mut self.transport)
    }

    /// Reset the bridge
    ///
    /// # Errors
    ///
    /// Returns the transport's reset error.
    pub fn reset(&mut self) -> Result<()> {
        self.transport.reset()
    }

    /// Underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the session, returning the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn regrid(&mut self) {
        self.grid = Grid::compute(&self.geometry, self.input.width(), self.input.height());
        let (width, height) = self.grid.output_size(&self.geometry);
        self.channels.realloc(width, height);
        debug!(
            "Grid {}×{}, channels {width}×{height}",
            self.grid.rows, self.grid.cols
        );
    }
}

fn check_payloads<T: Transport + ?Sized>(
    transport: &T,
    geometry: &TilingGeometry,
    labels: usize,
) -> Result<()> {
    let (tile_width, tile_height) = geometry.tile_in();
    if tile_width * tile_height != transport.tx_payload() {
        return Err(CrayonError::config(format!(
            "{tile_width}×{tile_height} tile does not match the {} byte send payload",
            transport.tx_payload()
        )));
    }
    if labels == 0 {
        return Err(CrayonError::config("at least one label is required"));
    }
    let needed = labels * geometry.channel_bytes();
    if needed > transport.rx_payload() {
        return Err(CrayonError::config(format!(
            "{labels} maps of {} bytes exceed the {} byte receive payload",
            geometry.channel_bytes(),
            transport.rx_payload()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SoftwareAccelerator;
    use crate::wait::NoWait;

    fn reference_arch() -> ArchitectureDescriptor {
        ArchitectureDescriptor::parse("c9-p2-c9-p2-c9-p2-c9").unwrap()
    }

    fn session(labels: usize) -> AcceleratorSession<SoftwareAccelerator> {
        AcceleratorSession::new(
            SoftwareAccelerator::reference(),
            reference_arch(),
            SessionConfig::with_labels(labels).immediate(),
        )
        .unwrap()
    }

    #[test]
    fn test_tile_must_match_send_payload() {
        let config = SessionConfig {
            tile_width: 240,
            ..SessionConfig::default()
        };
        let err =
            AcceleratorSession::new(SoftwareAccelerator::reference(), reference_arch(), config)
                .unwrap_err();
        assert!(matches!(err, CrayonError::Config { .. }));
    }

    #[test]
    fn test_label_count_validation() {
        let mut session = session(3);
        assert!(matches!(
            session.set_label_count(0),
            Err(CrayonError::Config { .. })
        ));
        assert!(matches!(
            session.set_label_count(13),
            Err(CrayonError::Config { .. })
        ));
        assert_eq!(session.channels().len(), 3);

        session.set_label_count(12).unwrap();
        assert_eq!(session.channels().len(), 12);
    }

    #[test]
    fn test_push_sizes_channels() {
        let mut session = session(3);
        session.push(Frame::new(720, 240));

        assert_eq!(session.grid(), Grid { rows: 3, cols: 1 });
        assert_eq!(session.channels().size(), (75, 15));
        assert_eq!(session.pull(2).unwrap().len(), 75 * 15);
        assert!(matches!(session.pull(3), Err(CrayonError::Bounds { .. })));
    }

    #[test]
    fn test_process_counts_cells() {
        let mut session = session(3);
        session.set_wait_policy(NoWait);
        session.push(Frame::new(720, 240));

        let metrics = session.process().unwrap();
        assert_eq!(metrics.cells, 3);
        assert_eq!(metrics.bytes_sent, 3 * 76_800);
        assert_eq!(metrics.bytes_received, 3 * 15_360);
        assert_eq!(session.transport().stats().requests, vec![0, 0, 0]);
    }

    #[test]
    fn test_set_arch_failure_keeps_session() {
        let mut session = session(3);
        session.push(Frame::new(720, 240));

        let deep = ArchitectureDescriptor::parse("c9-p2-c9-p2-c9-p2-c9-p2-c9").unwrap();
        assert!(session.set_arch(deep).is_err());
        assert_eq!(session.arch().to_string(), "c9-p2-c9-p2-c9-p2-c9");
        assert_eq!(session.channels().size(), (75, 15));
    }

    #[test]
    fn test_set_arch_rebuilds_grid() {
        let mut session = session(3);
        session.push(Frame::new(720, 240));

        session
            .set_arch(ArchitectureDescriptor::parse("c3-p2-c3-p2-c3").unwrap())
            .unwrap();
        let geometry = *session.geometry();
        assert_eq!((geometry.stride(), geometry.margin(), geometry.overlap()), (4, 3, 14));
        assert_eq!(geometry.tile_out(), (80, 60));
        assert_eq!(session.grid(), Grid::compute(&geometry, 720, 240));
        assert_eq!(
            session.channels().size(),
            session.grid().output_size(&geometry)
        );
    }
}
