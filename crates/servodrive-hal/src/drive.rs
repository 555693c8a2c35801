//! [`DifferentialDriveUnit`] – a pair of independently powered wheel motors.
//!
//! The unit owns a left and a right [`PowerVelocityMotor`], accepts
//! per-wheel power commands, advances both motors once per simulation tick
//! and exposes their velocities as encoder readings.
//!
//! There is no body-twist (linear/angular velocity) interface: converting a
//! twist into wheel powers needs a wheel-base model that is not part of this
//! unit.
//!
//! # Example
//!
//! ```rust
//! use servodrive_hal::drive::DifferentialDriveUnit;
//!
//! let mut unit = DifferentialDriveUnit::default();
//! unit.set_motor_commands(0.5, -0.5);
//! unit.on_simulation_tick(0.01).unwrap();
//!
//! let enc = unit.read_encoders();
//! assert!((enc.left + enc.right).abs() < 1e-12);
//! ```

use servodrive_types::{DriveError, EncoderReading, MotorState};
use tracing::{debug, warn};

use crate::motor::{LinearVelocityModel, PowerVelocityMotor, VelocityModel};

/// Two wheel motors driven side by side.
#[derive(Debug, Clone)]
pub struct DifferentialDriveUnit<M: VelocityModel = LinearVelocityModel> {
    left: PowerVelocityMotor<M>,
    right: PowerVelocityMotor<M>,
    last_tick: f64,
    encoders: EncoderReading,
}

impl<M: VelocityModel + Clone> DifferentialDriveUnit<M> {
    /// Build a unit whose wheels share the same motor model.
    pub fn new(model: M) -> Self {
        Self::with_models(model.clone(), model)
    }
}

impl<M: VelocityModel> DifferentialDriveUnit<M> {
    /// Build a unit with a separate model per wheel.
    pub fn with_models(left: M, right: M) -> Self {
        Self {
            left: PowerVelocityMotor::new(left),
            right: PowerVelocityMotor::new(right),
            last_tick: 0.0,
            encoders: EncoderReading::default(),
        }
    }

    /// Command both wheels.  Each power is clamped into `[-1, 1]` and takes
    /// effect from the last tick time.
    pub fn set_motor_commands(&mut self, left_power: f64, right_power: f64) {
        self.left.set_power(left_power, self.last_tick);
        self.right.set_power(right_power, self.last_tick);
        debug!(
            left = self.left.power(),
            right = self.right.power(),
            "motor commands set"
        );
    }

    /// Cut power to both wheels.
    pub fn all_stop(&mut self) {
        self.set_motor_commands(0.0, 0.0);
    }

    /// Advance both motors to simulation time `now` and refresh the encoders.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::NonMonotonicTime`] when `now` precedes the last
    /// tick.  Neither motor is touched in that case.
    pub fn on_simulation_tick(&mut self, now: f64) -> Result<EncoderReading, DriveError> {
        if let Err(err) = self
            .left
            .check_time(now)
            .and_then(|()| self.right.check_time(now))
        {
            warn!(previous = self.last_tick, now, "drive tick rejected");
            return Err(err);
        }

        let left = self.left.update_velocity(now)?;
        let right = self.right.update_velocity(now)?;
        self.last_tick = now;
        self.encoders = EncoderReading { left, right };
        Ok(self.encoders)
    }

    /// Velocities computed by the last tick.
    pub fn read_encoders(&self) -> EncoderReading {
        self.encoders
    }

    /// Power state of the (left, right) motors.
    pub fn motor_states(&self) -> (MotorState, MotorState) {
        (self.left.state(), self.right.state())
    }

    pub fn left(&self) -> &PowerVelocityMotor<M> {
        &self.left
    }

    pub fn right(&self) -> &PowerVelocityMotor<M> {
        &self.right
    }

    /// Time of the last accepted tick, seconds.
    pub fn last_tick(&self) -> f64 {
        self.last_tick
    }
}

impl Default for DifferentialDriveUnit<LinearVelocityModel> {
    fn default() -> Self {
        Self::new(LinearVelocityModel::default())
    }
}
