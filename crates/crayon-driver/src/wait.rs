//! Settle policies between a processing request and the result read
//!
//! The reference bridge has no data-ready signal: the host raises the start
//! request, sleeps, and reads whatever the FPGA has produced by then.
//!
//! **Known fragility:** with [`FixedDelay`], a delay shorter than the
//! accelerator's worst-case latency does not fail. The read returns a stale
//! or partial result and the frame is silently corrupted. Tune the delay on
//! the real board, or use [`AcknowledgedWait`] with a transport that can
//! report readiness.

use crate::error::{CrayonError, Result};
use crate::transport::Transport;
use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Wait strategy run after every start request
pub trait WaitPolicy: Debug + Send {
    /// Block until the result may be read
    ///
    /// # Errors
    ///
    /// Returns an error when the policy can tell that no plausible result
    /// will arrive. Policies never retry.
    fn settle(&self, transport: &mut dyn Transport) -> Result<()>;
}

/// Open-loop sleep of a fixed duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

impl FixedDelay {
    /// Sleep of `ms` milliseconds
    pub const fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }
}

impl WaitPolicy for FixedDelay {
    fn settle(&self, _transport: &mut dyn Transport) -> Result<()> {
        if !self.0.is_zero() {
            std::thread::sleep(self.0);
        }
        Ok(())
    }
}

/// Poll the transport's readiness probe until it reports ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcknowledgedWait {
    /// Give up after this long
    pub timeout: Duration,
    /// Sleep between probes
    pub poll_interval: Duration,
}

impl AcknowledgedWait {
    /// Acknowledged wait with a 1 ms poll interval
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl WaitPolicy for AcknowledgedWait {
    fn settle(&self, transport: &mut dyn Transport) -> Result<()> {
        let start = Instant::now();
        loop {
            match transport.poll_ready()? {
                Some(true) => return Ok(()),
                Some(false) => {}
                None => {
                    return Err(CrayonError::transport(format!(
                        "{} transport cannot acknowledge readiness",
                        transport.transport_type()
                    )))
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(CrayonError::Timeout {
                    duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                });
            }
            std::thread::sleep(self.poll_interval.min(self.timeout - elapsed));
        }
    }
}

/// No wait at all, for transports that finish processing synchronously
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoWait;

impl WaitPolicy for NoWait {
    fn settle(&self, _transport: &mut dyn Transport) -> Result<()> {
        Ok(())
    }
}
