//! Timestamped PID (Proportional–Integral–Derivative) controller.
//!
//! The controller computes a corrective output that drives a measured value
//! toward a target.  It is limit-agnostic: the caller supplies the
//! measurement and the current simulation time, receives the raw output and
//! applies whatever physical clamping its actuator needs.
//!
//! # Example
//!
//! ```rust
//! use servodrive_hal::pid::PidController;
//! use servodrive_types::PidGains;
//!
//! let mut pid = PidController::new(PidGains::new(1.0, 0.1, 0.05));
//! pid.set_target(0.5); // radians
//!
//! let output = pid.update(0.0, 0.01).unwrap(); // measurement=0 at t=10 ms
//! assert!(output > 0.0);
//! ```

use servodrive_types::{DriveError, PidGains};
use tracing::warn;

/// A PID controller that tracks its own timestamp.
///
/// Integral and previous-error state is only cleared by
/// [`restart_at`](PidController::restart_at) or by building a new controller.
#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    target: f64,
    current: f64,
    timestamp: f64,
    integral: f64,
    previous_error: Option<f64>,
    last_output: f64,
}

impl PidController {
    /// Create a controller with the given gains and zeroed target, current
    /// value and timestamp.
    pub fn new(gains: PidGains) -> Self {
        Self::starting_at(gains, 0.0)
    }

    /// Create a controller whose clock starts at `timestamp` seconds.
    pub fn starting_at(gains: PidGains, timestamp: f64) -> Self {
        Self {
            gains,
            target: 0.0,
            current: 0.0,
            timestamp,
            integral: 0.0,
            previous_error: None,
            last_output: 0.0,
        }
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Replace the gains.  Accumulated state is kept.
    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    /// Change the set-point.
    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Last measured value passed to [`update`](Self::update).
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Time of the last accepted update, seconds.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Output returned by the last accepted update (0 before the first one).
    pub fn last_output(&self) -> f64 {
        self.last_output
    }

    /// Move the clock to `timestamp` and drop integral, derivative and output
    /// memory.  Gains and target are kept.
    pub fn restart_at(&mut self, timestamp: f64) {
        self.timestamp = timestamp;
        self.integral = 0.0;
        self.previous_error = None;
        self.last_output = 0.0;
    }

    /// Compute the next controller output.
    ///
    /// - `measured` – the current measured value of the process variable.
    /// - `time` – the current simulation time in seconds.
    ///
    /// A `time` equal to the stored timestamp is a no-op that returns the
    /// previous output.  The derivative term is zero on the first update.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::NonMonotonicTime`] when `time` precedes the
    /// stored timestamp.  No state is touched in that case.
    pub fn update(&mut self, measured: f64, time: f64) -> Result<f64, DriveError> {
        // Written so that a NaN `time` is rejected as well.
        if !(time >= self.timestamp) {
            warn!(previous = self.timestamp, now = time, "pid update rejected");
            return Err(DriveError::NonMonotonicTime {
                previous: self.timestamp,
                now: time,
            });
        }

        let dt = time - self.timestamp;
        if dt == 0.0 {
            return Ok(self.last_output);
        }

        let error = self.target - measured;

        self.integral += error * dt;

        // Backward difference.
        let derivative = match self.previous_error {
            Some(prev) => (error - prev) / dt,
            None => 0.0,
        };

        let output =
            self.gains.p * error + self.gains.i * self.integral + self.gains.d * derivative;

        self.current = measured;
        self.previous_error = Some(error);
        self.timestamp = time;
        self.last_output = output;
        Ok(output)
    }
}

impl Default for PidController {
    fn default() -> Self {
        Self::new(PidGains::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(p: f64, i: f64, d: f64) -> PidController {
        PidController::new(PidGains::new(p, i, d))
    }

    #[test]
    fn proportional_only_drives_toward_target() {
        let mut pid = pid(2.0, 0.0, 0.0);
        pid.set_target(10.0);

        // error = 10.0 - 0.0 = 10.0 → output = 2.0 * 10.0 = 20.0
        let output = pid.update(0.0, 0.1).unwrap();
        assert!((output - 20.0).abs() < 1e-9);
    }

    #[test]
    fn output_is_zero_at_target() {
        let mut pid = pid(1.0, 0.0, 0.0);
        pid.set_target(5.0);
        let output = pid.update(5.0, 0.1).unwrap();
        assert!(output.abs() < 1e-12);
    }

    #[test]
    fn integral_accumulates_error_times_dt() {
        let mut pid = pid(0.0, 1.0, 0.0);
        pid.set_target(2.0);
        pid.update(1.0, 0.5).unwrap(); // integral += 1.0 * 0.5 = 0.5
        let out = pid.update(1.0, 1.0).unwrap(); // integral → 1.0
        assert!((out - 1.0).abs() < 1e-9);
        assert!((pid.integral() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn derivative_uses_previous_error() {
        let mut pid = pid(0.0, 0.0, 1.0);
        pid.set_target(1.0);
        // First update has no derivative memory.
        assert!(pid.update(0.0, 0.1).unwrap().abs() < 1e-12);
        // error goes 1.0 → 0.5 over 0.1 s: derivative = -5.0
        let out = pid.update(0.5, 0.2).unwrap();
        assert!((out + 5.0).abs() < 1e-9);
    }

    #[test]
    fn duplicate_timestamp_returns_previous_output() {
        let mut pid = pid(1.0, 1.0, 1.0);
        pid.set_target(5.0);
        let first = pid.update(0.0, 0.1).unwrap();
        let integral = pid.integral();

        // A different measurement at the same time must not change anything.
        let again = pid.update(3.0, 0.1).unwrap();
        assert_eq!(first, again);
        assert_eq!(pid.integral(), integral);
        assert_eq!(pid.current(), 0.0);
    }

    #[test]
    fn update_at_construction_time_is_noop() {
        let mut pid = pid(1.0, 0.0, 0.0);
        pid.set_target(1.0);
        assert_eq!(pid.update(0.0, 0.0).unwrap(), 0.0);
        assert_eq!(pid.timestamp(), 0.0);
    }

    #[test]
    fn backwards_time_fails_without_side_effects() {
        let mut pid = pid(1.0, 1.0, 1.0);
        pid.set_target(5.0);
        pid.update(0.0, 1.0).unwrap();
        let before = pid.clone();

        let err = pid.update(2.0, 0.5).unwrap_err();
        assert_eq!(
            err,
            DriveError::NonMonotonicTime {
                previous: 1.0,
                now: 0.5
            }
        );
        assert_eq!(pid.timestamp(), before.timestamp());
        assert_eq!(pid.integral(), before.integral());
        assert_eq!(pid.current(), before.current());
        assert_eq!(pid.last_output(), before.last_output());
    }

    #[test]
    fn nan_time_is_rejected() {
        let mut pid = pid(1.0, 0.0, 0.0);
        assert!(matches!(
            pid.update(0.0, f64::NAN),
            Err(DriveError::NonMonotonicTime { .. })
        ));
    }

    #[test]
    fn recovers_after_rejected_tick() {
        let mut pid = pid(1.0, 0.0, 0.0);
        pid.set_target(1.0);
        pid.update(0.0, 1.0).unwrap();
        assert!(pid.update(0.0, 0.9).is_err());
        let out = pid.update(0.5, 1.1).unwrap();
        assert!((out - 0.5).abs() < 1e-9);
        assert!((pid.timestamp() - 1.1).abs() < 1e-12);
    }

    #[test]
    fn set_gains_keeps_accumulated_state() {
        let mut pid = pid(1.0, 1.0, 0.0);
        pid.set_target(1.0);
        pid.update(0.0, 1.0).unwrap();
        pid.set_gains(PidGains::new(3.0, 0.0, 0.0));
        assert!((pid.integral() - 1.0).abs() < 1e-9);
        let output = pid.update(0.0, 2.0).unwrap();
        assert!((output - 3.0).abs() < 1e-9);
    }

    #[test]
    fn set_target_only_changes_target() {
        let mut pid = PidController::default();
        pid.set_target(0.7);
        assert_eq!(pid.target(), 0.7);
        assert_eq!(pid.timestamp(), 0.0);
        assert_eq!(pid.current(), 0.0);
        assert_eq!(pid.gains(), PidGains::default());
    }

    #[test]
    fn restart_at_clears_memory_but_keeps_target() {
        let mut pid = pid(1.0, 1.0, 1.0);
        pid.set_target(1.0);
        pid.update(0.0, 1.0).unwrap();
        pid.restart_at(50.0);

        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.last_output(), 0.0);
        assert_eq!(pid.target(), 1.0);
        assert!((pid.timestamp() - 50.0).abs() < f64::EPSILON);

        // No derivative kick and only 0.5 s of integral after the restart.
        let output = pid.update(0.0, 50.5).unwrap();
        assert!((output - 1.5).abs() < 1e-9);
    }
}
