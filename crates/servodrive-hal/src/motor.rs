//! Open-loop power-to-velocity motor models.
//!
//! [`PowerVelocityMotor`] holds the commanded power and the motor's velocity
//! state.  How power turns into velocity over time is delegated to a
//! [`VelocityModel`], so a more realistic torque/inertia model can be dropped
//! in without touching [`DifferentialDriveUnit`][crate::drive::DifferentialDriveUnit].

use servodrive_types::{DriveError, MotorState};
use tracing::{trace, warn};

/// Result of one velocity update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityStep {
    /// Velocity the motor is heading toward, rad/s.
    pub target: f64,
    /// Velocity after this update, rad/s.
    pub current: f64,
}

/// Strategy that advances a motor's velocity by `dt` seconds.
pub trait VelocityModel {
    /// `power` is already clamped to `[-1, 1]`; `dt` is strictly positive.
    fn update_velocity(&mut self, power: f64, current: f64, dt: f64) -> VelocityStep;
}

// ────────────────────────────────────────────────────────────────────────────
// Linear model
// ────────────────────────────────────────────────────────────────────────────

/// Target velocity proportional to power.
///
/// With no `acceleration` the motor reaches its target on the first tick
/// with a positive `dt`; otherwise it slews toward it at `acceleration`
/// rad/s².
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearVelocityModel {
    /// Velocity at full power, rad/s.
    pub max_velocity: f64,
    /// Slew rate, rad/s².  `None` means an immediate response.
    pub acceleration: Option<f64>,
}

impl LinearVelocityModel {
    /// 0.2 m/s top wheel speed on a 0.01 m wheel radius.
    pub const DEFAULT_MAX_VELOCITY: f64 = 20.0;

    pub fn new(max_velocity: f64) -> Self {
        Self {
            max_velocity,
            acceleration: None,
        }
    }

    /// Slew at `acceleration` rad/s².  A non-finite rate is ignored and the
    /// model keeps its immediate response.
    pub fn with_acceleration(mut self, acceleration: f64) -> Self {
        if acceleration.is_finite() {
            self.acceleration = Some(acceleration);
        } else {
            warn!(acceleration, "non-finite motor acceleration ignored");
        }
        self
    }
}

impl Default for LinearVelocityModel {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_VELOCITY)
    }
}

impl VelocityModel for LinearVelocityModel {
    fn update_velocity(&mut self, power: f64, current: f64, dt: f64) -> VelocityStep {
        let target = power * self.max_velocity;
        let current = match self.acceleration {
            None => target,
            Some(accel) => {
                let max_delta = accel.abs() * dt;
                // NaN from a NaN rate set on the field, or 0 * inf.
                if !(max_delta >= 0.0) {
                    current
                } else {
                    current + (target - current).clamp(-max_delta, max_delta)
                }
            }
        };
        VelocityStep { target, current }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// First-order lag model
// ────────────────────────────────────────────────────────────────────────────

/// Target velocity proportional to power, approached through a first-order
/// low-pass filter with time constant `time_constant` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirstOrderLagModel {
    /// Velocity at full power, rad/s.
    pub max_velocity: f64,
    /// Filter time constant, seconds.  Zero behaves like an immediate response.
    pub time_constant: f64,
}

impl FirstOrderLagModel {
    pub fn new(max_velocity: f64, time_constant: f64) -> Self {
        Self {
            max_velocity,
            time_constant,
        }
    }
}

impl VelocityModel for FirstOrderLagModel {
    fn update_velocity(&mut self, power: f64, current: f64, dt: f64) -> VelocityStep {
        let target = power * self.max_velocity;
        let alpha = if self.time_constant > 0.0 {
            dt / (self.time_constant + dt)
        } else {
            1.0
        };
        VelocityStep {
            target,
            current: current + alpha * (target - current),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PowerVelocityMotor
// ────────────────────────────────────────────────────────────────────────────

/// A drive motor commanded by normalized power.
#[derive(Debug, Clone)]
pub struct PowerVelocityMotor<M: VelocityModel = LinearVelocityModel> {
    model: M,
    power: f64,
    timestamp: f64,
    current_velocity: f64,
    target_velocity: f64,
}

impl<M: VelocityModel> PowerVelocityMotor<M> {
    /// Create an idle motor at rest with its clock at zero.
    pub fn new(model: M) -> Self {
        Self {
            model,
            power: 0.0,
            timestamp: 0.0,
            current_velocity: 0.0,
            target_velocity: 0.0,
        }
    }

    /// Store `power`, clamped into `[-1, 1]`, stamped with `time`.
    ///
    /// NaN is treated as zero power.
    pub fn set_power(&mut self, power: f64, time: f64) {
        let clamped = if power.is_nan() {
            warn!("NaN motor power treated as zero");
            0.0
        } else {
            power.clamp(-1.0, 1.0)
        };
        self.power = clamped;
        self.timestamp = time;
    }

    /// Advance the velocity to simulation time `now` and return it.
    ///
    /// A zero elapsed time returns the current velocity unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::NonMonotonicTime`] when `now` precedes the stored
    /// timestamp.  No state is touched in that case.
    pub fn update_velocity(&mut self, now: f64) -> Result<f64, DriveError> {
        self.check_time(now)?;

        let dt = now - self.timestamp;
        if dt == 0.0 {
            return Ok(self.current_velocity);
        }

        let step = self.model.update_velocity(self.power, self.current_velocity, dt);
        self.target_velocity = step.target;
        self.current_velocity = step.current;
        self.timestamp = now;
        trace!(power = self.power, dt, velocity = self.current_velocity, "motor update");
        Ok(self.current_velocity)
    }

    /// Fail with [`DriveError::NonMonotonicTime`] if `now` would move this
    /// motor's clock backwards.
    pub fn check_time(&self, now: f64) -> Result<(), DriveError> {
        if now >= self.timestamp {
            Ok(())
        } else {
            Err(DriveError::NonMonotonicTime {
                previous: self.timestamp,
                now,
            })
        }
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn current_velocity(&self) -> f64 {
        self.current_velocity
    }

    pub fn target_velocity(&self) -> f64 {
        self.target_velocity
    }

    pub fn state(&self) -> MotorState {
        if self.power == 0.0 {
            MotorState::Idle
        } else {
            MotorState::Driving
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl Default for PowerVelocityMotor<LinearVelocityModel> {
    fn default() -> Self {
        Self::new(LinearVelocityModel::default())
    }
}
