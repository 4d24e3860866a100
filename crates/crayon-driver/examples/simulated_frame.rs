//! Run one synthetic frame through the simulated accelerator
//!
//! Shows the full tiling → transport → reassembly path without hardware.

use crayon_driver::{
    AcceleratorSession, ArchitectureDescriptor, Frame, NoWait, Result, SessionConfig,
    SoftwareAccelerator,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("crayon_driver=info")
        .init();

    let arch = ArchitectureDescriptor::parse("c9-p2-c9-p2-c9-p2-c9")?;
    let board = SoftwareAccelerator::new(&arch, 3)?;
    let mut session = AcceleratorSession::new(board, arch, SessionConfig::default())?;
    session.set_wait_policy(NoWait);

    let geometry = session.geometry();
    println!(
        "Geometry: stride {}, margin {}, overlap {}",
        geometry.stride(), geometry.margin(), geometry.overlap()
    );

    // Horizontal ramp
    let mut frame = Frame::new(720, 240);
    for y in 0..240 {
        for x in 0..720 {
            frame[(x, y)] = u8::try_from(x * 255 / 719).unwrap_or(u8::MAX);
        }
    }
    session.push(frame);

    let metrics = session.process()?;
    println!("Processed {} cells in {:?}", metrics.cells, metrics.duration);

    for (label, channel) in session.channels().frames().iter().enumerate() {
        let row: Vec<u8> = (0..channel.width()).step_by(15).map(|x| channel[(x, 0)]).collect();
        println!("label {label} ({}×{}): {row:?}", channel.width(), channel.height());
    }

    Ok(())
}
