//! End-to-end session tests against the simulated board

use crayon_driver::{
    AcceleratorSession, AcknowledgedWait, ArchitectureDescriptor, CrayonError, Frame, NoWait,
    Result, SessionConfig, SoftwareAccelerator, Transport, TransportType,
};
use std::time::Duration;

const REFERENCE_ARCH: &str = "c9-p2-c9-p2-c9-p2-c9";

fn reference_arch() -> ArchitectureDescriptor {
    ArchitectureDescriptor::parse(REFERENCE_ARCH).unwrap()
}

fn session_on<T: Transport>(transport: T, labels: usize) -> AcceleratorSession<T> {
    AcceleratorSession::new(
        transport,
        reference_arch(),
        SessionConfig::with_labels(labels).immediate(),
    )
    .unwrap()
}

/// Every aligned 8×8 block holds `x/8 + y/8`, so block means are exact.
#[allow(clippy::cast_possible_truncation)]
fn gradient(width: usize, height: usize) -> Frame {
    let mut frame = Frame::new(width, height);
    for y in 0..height {
        for x in 0..width {
            frame[(x, y)] = (x / 8 + y / 8) as u8;
        }
    }
    frame
}

#[test]
fn test_uniform_frame_yields_uniform_channels() {
    let mut session = session_on(SoftwareAccelerator::reference(), 3);
    let mut frame = Frame::new(720, 240);
    frame.fill(100);
    session.push(frame);

    let metrics = session.process().unwrap();
    assert_eq!(metrics.cells, 3);

    for (label, expected) in [(0, 100u8), (1, 155), (2, 50)] {
        let channel = session.pull(label).unwrap();
        assert_eq!((channel.width(), channel.height()), (75, 15));
        assert!(
            channel.as_bytes().iter().all(|&b| b == expected),
            "label {label} not uniform {expected}"
        );
    }
}

#[test]
fn test_margin_trim_and_placement() {
    let mut session = session_on(SoftwareAccelerator::reference(), 3);
    session.push(gradient(720, 440));
    session.process().unwrap();

    let grid = session.grid();
    assert_eq!((grid.rows, grid.cols), (3, 2));

    let label0 = session.pull(0).unwrap();
    let label1 = session.pull(1).unwrap();
    assert_eq!((label0.width(), label0.height()), (75, 30));

    for y in 0..30 {
        // last row of every tile carries a copy of the row above it
        let source_y = if y % 15 == 14 { y - 1 } else { y };
        for x in 0..75 {
            let mean = u8::try_from(x + 15 + source_y + 15).unwrap();
            assert_eq!(label0[(x, y)], mean, "label 0 at ({x}, {y})");
            assert_eq!(label1[(x, y)], 255 - mean, "label 1 at ({x}, {y})");
        }
    }
}

#[test]
fn test_reprocessing_is_idempotent() {
    let mut session = session_on(SoftwareAccelerator::reference(), 3);
    session.push(gradient(920, 360));

    session.process().unwrap();
    let first = session.channels().clone();
    session.process().unwrap();

    assert_eq!(session.channels(), &first);
}

#[test]
fn test_push_resets_channels() {
    let mut session = session_on(SoftwareAccelerator::reference(), 1);
    let mut frame = Frame::new(720, 240);
    frame.fill(9);
    session.push(frame.clone());
    session.process().unwrap();
    assert_eq!(session.pull(0).unwrap()[(0, 0)], 9);

    session.push(frame);
    assert!(session.pull(0).unwrap().as_bytes().iter().all(|&b| b == 0));
}

#[test]
fn test_input_smaller_than_tile_processes_nothing() {
    let mut session = session_on(SoftwareAccelerator::reference(), 3);
    session.push(Frame::new(100, 100));

    let metrics = session.process().unwrap();
    assert_eq!(metrics.cells, 0);
    assert_eq!(session.channels().size(), (0, 0));
    assert_eq!(session.transport().stats().sends, 0);
}

#[test]
fn test_transport_error_aborts_frame() {
    let board = SoftwareAccelerator::reference().fail_on_send(2);
    let mut session = session_on(board, 3);
    session.push(Frame::new(720, 240));

    let err = session.process().unwrap_err();
    assert!(matches!(err, CrayonError::Transport { .. }));

    let stats = session.transport().stats();
    assert_eq!(stats.sends, 1);
    assert_eq!(stats.receives, 1);
}

#[test]
fn test_short_fixed_delay_fails_loudly_in_simulation() {
    let board = SoftwareAccelerator::reference().with_latency(Duration::from_millis(20));
    let mut session = session_on(board, 3);
    session.set_settle_delay(Duration::ZERO);
    session.push(Frame::new(720, 240));

    assert!(matches!(
        session.process(),
        Err(CrayonError::Transport { .. })
    ));
}

#[test]
fn test_acknowledged_wait_survives_latency() {
    let board = SoftwareAccelerator::reference().with_latency(Duration::from_millis(5));
    let mut slow = session_on(board, 3);
    slow.set_wait_policy(AcknowledgedWait::new(Duration::from_secs(1)));
    slow.push(gradient(720, 240));
    slow.process().unwrap();

    let mut fast = session_on(SoftwareAccelerator::reference(), 3);
    fast.set_wait_policy(NoWait);
    fast.push(gradient(720, 240));
    fast.process().unwrap();

    assert_eq!(slow.channels(), fast.channels());
}

#[test]
fn test_acknowledged_wait_times_out() {
    let board = SoftwareAccelerator::reference().with_latency(Duration::from_secs(5));
    let mut session = session_on(board, 3);
    session.set_wait_policy(AcknowledgedWait::new(Duration::from_millis(10)));
    session.push(Frame::new(720, 240));

    assert!(matches!(
        session.process(),
        Err(CrayonError::Timeout { .. })
    ));
}

#[test]
fn test_labels_exceeding_payload_rejected() {
    let err = AcceleratorSession::new(
        SoftwareAccelerator::reference(),
        reference_arch(),
        SessionConfig::with_labels(13),
    )
    .unwrap_err();
    assert!(matches!(err, CrayonError::Config { .. }));
}

/// Bridge that drops the last byte of every result
#[derive(Debug)]
struct ShortRead(SoftwareAccelerator);

impl Transport for ShortRead {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.0.send(data)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize> {
        Ok(self.0.receive(buffer)? - 1)
    }

    fn control_request(&mut self, code: u16) -> Result<()> {
        self.0.control_request(code)
    }

    fn tx_payload(&self) -> usize {
        self.0.tx_payload()
    }

    fn rx_payload(&self) -> usize {
        self.0.rx_payload()
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Software
    }
}

#[test]
fn test_short_read_is_transport_error() {
    let mut session = session_on(ShortRead(SoftwareAccelerator::reference()), 3);
    session.push(Frame::new(720, 240));

    assert!(matches!(
        session.process(),
        Err(CrayonError::Transport { .. })
    ));
}

#[test]
fn test_boxed_transport_and_into_transport() {
    let boxed: Box<dyn Transport> = Box::new(SoftwareAccelerator::reference());
    let mut session = session_on(boxed, 2);
    session.push(Frame::new(720, 240));
    session.process().unwrap();
    session.reset().unwrap();

    let transport = session.into_transport();
    assert_eq!(transport.transport_type(), TransportType::Software);
}

#[test]
#[ignore] // Requires hardware
fn test_hardware_frame() {
    let bridge = crayon_driver::BridgeManager::discover()
        .and_then(|m| m.open(crayon_driver::usb_ids::DEFAULT_PRODUCT))
        .expect("bridge present");
    let mut session =
        AcceleratorSession::new(bridge, reference_arch(), SessionConfig::default()).unwrap();

    session.push(gradient(720, 240));
    let metrics = session.process().unwrap();
    println!("✅ {} cells in {:?}", metrics.cells, metrics.duration);
}
