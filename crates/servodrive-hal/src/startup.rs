//! Bounded wait for the host to become ready before the first tick.
//!
//! Hosts usually bring up their middleware asynchronously.  Rather than spin
//! inside the control core, the host-integration layer calls
//! [`wait_until_ready`] once at load time with a readiness probe and a
//! [`StartupPolicy`].

use std::thread;
use std::time::{Duration, Instant};

use servodrive_types::DriveError;
use tracing::{error, info};

/// How long to wait for readiness and how often to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl StartupPolicy {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(250);

    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }
}

impl Default for StartupPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT, Self::DEFAULT_POLL_INTERVAL)
    }
}

/// Poll `probe` until it returns `true` or `policy.timeout` elapses.
///
/// The probe is always called at least once, so an already-ready host
/// returns immediately.  On success the time spent waiting is returned.
///
/// # Errors
///
/// Returns [`DriveError::StartupTimeout`] when the deadline passes without a
/// successful probe.
pub fn wait_until_ready<F>(mut probe: F, policy: StartupPolicy) -> Result<Duration, DriveError>
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    loop {
        if probe() {
            let waited = start.elapsed();
            info!(waited_ms = waited.as_millis() as u64, "host ready");
            return Ok(waited);
        }
        let waited = start.elapsed();
        if waited >= policy.timeout {
            let waited_ms = waited.as_millis() as u64;
            error!(waited_ms, "host did not become ready in time");
            return Err(DriveError::StartupTimeout { waited_ms });
        }
        thread::sleep(policy.poll_interval.min(policy.timeout - waited));
    }
}
