//! [`ActuatorLimits`] – validated, immutable physical bounds for one joint.
//!
//! Limits are checked once when they are built from [`ActuatorParams`] and
//! never recomputed afterwards.  Other components only consult them through
//! the clamping helpers.

use servodrive_types::{ActuatorParams, DriveError};
use tracing::warn;

/// Immutable rotation, velocity and torque bounds.
///
/// The only way to obtain one is through [`ActuatorLimits::new`] (or
/// [`Default`]), so every instance satisfies `min_rotation <= max_rotation`
/// with all magnitudes finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorLimits {
    max_rotation: f64,
    min_rotation: f64,
    max_velocity: f64,
    max_torque: f64,
}

impl ActuatorLimits {
    /// Validate `params` and freeze them into limits.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::InvalidActuatorParams`] when the params fail
    /// [`ActuatorLimits::validate`].
    pub fn new(params: ActuatorParams) -> Result<Self, DriveError> {
        Self::validate(&params)?;
        Ok(Self {
            max_rotation: params.max_rotation_rad,
            min_rotation: params.min_rotation_rad,
            max_velocity: params.max_velocity_rad_s,
            max_torque: params.max_torque_nm,
        })
    }

    /// Check the invariants without building anything.
    ///
    /// Fails when `min_rotation > max_rotation`, when `max_velocity` or
    /// `max_torque` is negative, or when any field is NaN or infinite.
    pub fn validate(params: &ActuatorParams) -> Result<(), DriveError> {
        let fields = [
            ("max_rotation_rad", params.max_rotation_rad),
            ("min_rotation_rad", params.min_rotation_rad),
            ("max_velocity_rad_s", params.max_velocity_rad_s),
            ("max_torque_nm", params.max_torque_nm),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(invalid(format!("{name} must be finite, got {value}")));
            }
        }

        if params.min_rotation_rad > params.max_rotation_rad {
            return Err(invalid(format!(
                "min_rotation_rad {} exceeds max_rotation_rad {}",
                params.min_rotation_rad, params.max_rotation_rad
            )));
        }
        if params.max_velocity_rad_s < 0.0 {
            return Err(invalid(format!(
                "max_velocity_rad_s {} is negative",
                params.max_velocity_rad_s
            )));
        }
        if params.max_torque_nm < 0.0 {
            return Err(invalid(format!(
                "max_torque_nm {} is negative",
                params.max_torque_nm
            )));
        }
        Ok(())
    }

    pub fn max_rotation(&self) -> f64 {
        self.max_rotation
    }

    pub fn min_rotation(&self) -> f64 {
        self.min_rotation
    }

    pub fn max_velocity(&self) -> f64 {
        self.max_velocity
    }

    pub fn max_torque(&self) -> f64 {
        self.max_torque
    }

    /// Clamp `pose` into `[min_rotation, max_rotation]`.  NaN maps to the
    /// lower bound so an out-of-range value is never stored.
    pub fn clamp_pose(&self, pose: f64) -> f64 {
        if pose.is_nan() {
            return self.min_rotation;
        }
        pose.clamp(self.min_rotation, self.max_rotation)
    }

    /// Clamp a pose change over `dt` seconds so the implied velocity stays
    /// within `max_velocity`.  NaN deltas collapse to zero.
    pub fn clamp_step(&self, delta: f64, dt: f64) -> f64 {
        if delta.is_nan() {
            return 0.0;
        }
        let max_step = self.max_velocity * dt;
        if !(max_step >= 0.0) {
            return 0.0;
        }
        delta.clamp(-max_step, max_step)
    }
}

impl Default for ActuatorLimits {
    fn default() -> Self {
        let params = ActuatorParams::default();
        Self {
            max_rotation: params.max_rotation_rad,
            min_rotation: params.min_rotation_rad,
            max_velocity: params.max_velocity_rad_s,
            max_torque: params.max_torque_nm,
        }
    }
}

impl TryFrom<ActuatorParams> for ActuatorLimits {
    type Error = DriveError;

    fn try_from(params: ActuatorParams) -> Result<Self, Self::Error> {
        Self::new(params)
    }
}

fn invalid(details: String) -> DriveError {
    warn!(%details, "rejecting actuator params");
    DriveError::InvalidActuatorParams { details }
}
