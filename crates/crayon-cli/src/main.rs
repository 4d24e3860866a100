//! `crayon` — command-line interface for the CrayOn FPGA accelerator.
//!
//! ```text
//! USAGE:
//!   crayon enumerate                       List FX2-LP bridges
//!   crayon geometry <arch>                 Print tiling geometry and grid
//!   crayon load --program F --parameters F Upload configuration listings
//!   crayon reset                           Reset the bridge
//!   crayon run --output-dir D FRAME...     Run raw 8-bit frames through the board
//! ```
//!
//! Every command that talks to a board accepts `--software` to use the
//! simulated accelerator instead.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crayon_driver::usb_ids::DEFAULT_PRODUCT;
use crayon_driver::{
    AcceleratorSession, ArchitectureDescriptor, BridgeManager, ConfigImage, ConfigLoader, Frame,
    Grid, LoadConfig, MemoryTarget, SessionConfig, SoftwareAccelerator, TilingGeometry, Transport,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const REFERENCE_ARCH: &str = "c9-p2-c9-p2-c9-p2-c9";

#[derive(Parser)]
#[command(name = "crayon", about = "CrayOn FPGA accelerator CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List all CrayOn bridges.
    Enumerate,
    /// Print the tiling geometry of an architecture descriptor.
    Geometry {
        /// Layer descriptor (e.g. c9-p2-c9-p2-c9-p2-c9).
        arch: ArchitectureDescriptor,
        /// Input frame width.
        #[arg(long, default_value_t = 720)]
        width: usize,
        /// Input frame height.
        #[arg(long, default_value_t = 240)]
        height: usize,
        /// Accelerator tile width.
        #[arg(long, default_value_t = 320)]
        tile_width: usize,
        /// Accelerator tile height.
        #[arg(long, default_value_t = 240)]
        tile_height: usize,
    },
    /// Upload µ-program and/or parameter listings.
    Load {
        /// µ-program listing.
        #[arg(long)]
        program: Option<PathBuf>,
        /// Parameter (kernel) listing.
        #[arg(long)]
        parameters: Option<PathBuf>,
        #[command(flatten)]
        target: Target,
    },
    /// Reset the bridge FIFOs and FPGA interface.
    Reset {
        #[command(flatten)]
        target: Target,
    },
    /// Process raw 8-bit grayscale frames, one raw file per label out.
    Run {
        /// Layer descriptor.
        #[arg(long, default_value = REFERENCE_ARCH)]
        arch: ArchitectureDescriptor,
        /// Output maps per tile.
        #[arg(long, default_value_t = 3)]
        labels: usize,
        /// Settle delay after each start request (ms).
        #[arg(long, default_value_t = 8)]
        delay_ms: u64,
        /// Frame width.
        #[arg(long, default_value_t = 720)]
        width: usize,
        /// Frame height.
        #[arg(long, default_value_t = 240)]
        height: usize,
        /// Directory receiving `<stem>.label<N>.raw`.
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
        #[command(flatten)]
        target: Target,
        /// Raw frames (width × height bytes each).
        #[arg(required = true)]
        frames: Vec<PathBuf>,
    },
}

/// Board selection shared by every command that opens a transport.
#[derive(Args)]
struct Target {
    /// Bridge product string.
    #[arg(long, default_value = DEFAULT_PRODUCT)]
    device: String,
    /// Use the simulated accelerator.
    #[arg(long)]
    software: bool,
}

impl Target {
    fn open(&self, arch: &ArchitectureDescriptor, labels: usize) -> Result<Box<dyn Transport>> {
        if self.software {
            return Ok(Box::new(SoftwareAccelerator::new(arch, labels)?));
        }
        let mgr = BridgeManager::discover()?;
        Ok(Box::new(mgr.open(&self.device)?))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Enumerate => cmd_enumerate()?,
        Cmd::Geometry {
            arch,
            width,
            height,
            tile_width,
            tile_height,
        } => cmd_geometry(&arch, (width, height), (tile_width, tile_height))?,
        Cmd::Load {
            program,
            parameters,
            target,
        } => cmd_load(program.as_deref(), parameters.as_deref(), &target)?,
        Cmd::Reset { target } => cmd_reset(&target)?,
        Cmd::Run {
            arch,
            labels,
            delay_ms,
            width,
            height,
            output_dir,
            target,
            frames,
        } => {
            let config = SessionConfig {
                labels,
                settle_delay: Duration::from_millis(delay_ms),
                ..SessionConfig::default()
            };
            cmd_run(arch, config, (width, height), &output_dir, &target, &frames)?;
        }
    }

    Ok(())
}

fn cmd_enumerate() -> Result<()> {
    let mgr = BridgeManager::discover()?;

    println!("CrayOn bridges: {}", mgr.bridge_count());
    println!();

    for bridge in mgr.bridges() {
        println!(
            "[{:03}/{:03}] {:?} @ {}",
            bridge.bus,
            bridge.address,
            bridge.product,
            bridge.path().display()
        );
    }

    Ok(())
}

fn cmd_geometry(
    arch: &ArchitectureDescriptor,
    (width, height): (usize, usize),
    (tile_width, tile_height): (usize, usize),
) -> Result<()> {
    let geometry = TilingGeometry::new(arch, tile_width, tile_height)?;
    let grid = Grid::compute(&geometry, width, height);
    let (out_w, out_h) = grid.output_size(&geometry);

    println!("Architecture : {arch}");
    println!("Stride       : {}", geometry.stride());
    println!("Margin       : {}", geometry.margin());
    println!("Overlap      : {}", geometry.overlap());
    println!("Input tile   : {}×{}", geometry.tile_in().0, geometry.tile_in().1);
    println!("Output tile  : {}×{}", geometry.tile_out().0, geometry.tile_out().1);
    println!("Grid         : {} rows × {} cols ({width}×{height} input)", grid.rows, grid.cols);
    println!("Channel      : {out_w}×{out_h}");

    Ok(())
}

fn cmd_load(program: Option<&Path>, parameters: Option<&Path>, target: &Target) -> Result<()> {
    if program.is_none() && parameters.is_none() {
        anyhow::bail!("nothing to load: pass --program and/or --parameters");
    }

    let arch = ArchitectureDescriptor::parse(REFERENCE_ARCH)?;
    let mut transport = target.open(&arch, 3)?;
    let config = if target.software {
        LoadConfig::immediate(LoadConfig::default().chunk_size)
    } else {
        LoadConfig::default()
    };
    let loader = ConfigLoader::new(config);

    let listings = [
        (program, MemoryTarget::Program),
        (parameters, MemoryTarget::Parameters),
    ];
    for (path, memory) in listings {
        let Some(path) = path else { continue };
        let image = ConfigImage::from_file(path, memory)
            .with_context(|| format!("reading {}", path.display()))?;
        let metrics = loader.load(&image, &mut transport)?;
        println!(
            "{memory}: {} bytes in {} chunk(s), {:?}",
            metrics.bytes_transferred, metrics.chunks_transferred, metrics.duration
        );
    }

    Ok(())
}

fn cmd_reset(target: &Target) -> Result<()> {
    let arch = ArchitectureDescriptor::parse(REFERENCE_ARCH)?;
    let mut transport = target.open(&arch, 3)?;
    transport.reset()?;
    println!("Reset {}", transport.transport_type());
    Ok(())
}

fn cmd_run(
    arch: ArchitectureDescriptor,
    config: SessionConfig,
    (width, height): (usize, usize),
    output_dir: &Path,
    target: &Target,
    frames: &[PathBuf],
) -> Result<()> {
    let transport = target.open(&arch, config.labels)?;
    let labels = config.labels;
    let mut session = AcceleratorSession::new(transport, arch, config)?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    for path in frames {
        let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let frame = Frame::from_raw(width, height, data)
            .with_context(|| format!("{} is not a {width}×{height} raw frame", path.display()))?;

        session.push(frame);
        let metrics = session.process()?;

        let stem = path
            .file_stem()
            .map_or_else(|| "frame".into(), |s| s.to_string_lossy());
        for label in 0..labels {
            let out = output_dir.join(format!("{stem}.label{label}.raw"));
            std::fs::write(&out, session.pull(label)?.as_bytes())
                .with_context(|| format!("writing {}", out.display()))?;
        }

        info!("{} processed", path.display());
        println!(
            "{}: {} cells in {:.1} ms",
            path.display(),
            metrics.cells,
            metrics.duration.as_secs_f64() * 1000.0
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["crayon", "run", "--software", "a.raw"]).unwrap();
        let Cmd::Run {
            arch,
            labels,
            delay_ms,
            target,
            frames,
            ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(arch.to_string(), REFERENCE_ARCH);
        assert_eq!((labels, delay_ms), (3, 8));
        assert!(target.software);
        assert_eq!(target.device, "transceiver");
        assert_eq!(frames, vec![PathBuf::from("a.raw")]);
    }

    #[test]
    fn test_bad_descriptor_rejected_by_parser() {
        assert!(Cli::try_parse_from(["crayon", "geometry", "c9-x2"]).is_err());
    }

    #[test]
    fn test_run_software_writes_label_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("scene.raw");
        std::fs::write(&input, vec![40u8; 720 * 240]).unwrap();

        let config = SessionConfig::default().immediate();
        let target = Target {
            device: DEFAULT_PRODUCT.into(),
            software: true,
        };
        cmd_run(
            ArchitectureDescriptor::parse(REFERENCE_ARCH).unwrap(),
            config,
            (720, 240),
            dir.path(),
            &target,
            &[input],
        )
        .unwrap();

        let label1 = std::fs::read(dir.path().join("scene.label1.raw")).unwrap();
        assert_eq!(label1.len(), 75 * 15);
        assert!(label1.iter().all(|&b| b == 215));
    }

    #[test]
    fn test_run_rejects_wrong_frame_size() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("short.raw");
        std::fs::write(&input, vec![0u8; 100]).unwrap();

        let target = Target {
            device: DEFAULT_PRODUCT.into(),
            software: true,
        };
        assert!(cmd_run(
            ArchitectureDescriptor::parse(REFERENCE_ARCH).unwrap(),
            SessionConfig::default().immediate(),
            (720, 240),
            dir.path(),
            &target,
            &[input],
        )
        .is_err());
    }
}
