use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw actuator limits as supplied by a caller or a config file.
///
/// These are unvalidated; `servodrive-hal` turns them into an immutable
/// `ActuatorLimits` after checking their invariants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorParams {
    /// Upper bound of the permissible pose range, radians.
    pub max_rotation_rad: f64,
    /// Lower bound of the permissible pose range, radians.
    pub min_rotation_rad: f64,
    /// Clamp on the magnitude of the commanded velocity, rad/s.
    pub max_velocity_rad_s: f64,
    /// Clamp on commanded effort, N·m.  Stored for the consumer of the
    /// actuator output; never computed internally.
    pub max_torque_nm: f64,
}

impl ActuatorParams {
    /// Quarter-turn either side of centre.
    pub const DEFAULT_MAX_ROTATION_RAD: f64 = std::f64::consts::FRAC_PI_2;
    pub const DEFAULT_MIN_ROTATION_RAD: f64 = -std::f64::consts::FRAC_PI_2;
    /// 60° in 0.2 s, a typical hobby-servo slew rate.
    pub const DEFAULT_MAX_VELOCITY_RAD_S: f64 = 5.236;
    pub const DEFAULT_MAX_TORQUE_NM: f64 = 1.0;
}

impl Default for ActuatorParams {
    fn default() -> Self {
        Self {
            max_rotation_rad: Self::DEFAULT_MAX_ROTATION_RAD,
            min_rotation_rad: Self::DEFAULT_MIN_ROTATION_RAD,
            max_velocity_rad_s: Self::DEFAULT_MAX_VELOCITY_RAD_S,
            max_torque_nm: Self::DEFAULT_MAX_TORQUE_NM,
        }
    }
}

/// Proportional, integral and derivative gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidGains {
    pub p: f64,
    pub i: f64,
    pub d: f64,
}

impl PidGains {
    pub const DEFAULT_P: f64 = 8.0;
    pub const DEFAULT_I: f64 = 0.0;
    pub const DEFAULT_D: f64 = 0.1;

    pub fn new(p: f64, i: f64, d: f64) -> Self {
        Self { p, i, d }
    }
}

impl Default for PidGains {
    fn default() -> Self {
        Self::new(Self::DEFAULT_P, Self::DEFAULT_I, Self::DEFAULT_D)
    }
}

/// Per-wheel velocities of a differential-drive unit, rad/s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EncoderReading {
    pub left: f64,
    pub right: f64,
}

/// Power state of a single drive motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotorState {
    /// Zero power; velocity settles toward zero.
    Idle,
    /// Non-zero power.
    Driving,
}

/// Commands the host (teleop, planner, CLI) may send to a drive rig.
///
/// There is deliberately no linear/angular velocity command: converting a
/// body twist into wheel targets needs a wheel-base model that has not been
/// settled yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload")]
pub enum DriveIntent {
    /// New set-point for a named servo joint.
    SetServoTarget { joint_id: String, target_rad: f64 },
    /// Independent normalized power for the left and right wheel motors.
    SetMotorPower { left: f64, right: f64 },
    /// Hold every servo where it is and cut power to both wheel motors.
    AllStop,
}

/// Snapshot produced by one simulation tick of a drive rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickTelemetry {
    /// Simulation time of the tick, seconds.
    pub time_s: f64,
    /// Commanded pose of each servo, in registration order.
    pub servo_poses: Vec<(String, f64)>,
    /// Wheel encoder velocities, if the rig has a drive unit.
    pub encoders: Option<EncoderReading>,
}

/// Error type for the actuator and drive control core.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DriveError {
    #[error("Invalid actuator handle for joint '{joint}'")]
    InvalidActuatorHandle { joint: String },

    #[error("Invalid actuator params: {details}")]
    InvalidActuatorParams { details: String },

    #[error("Non-monotonic time: tick at {now}s precedes last recorded {previous}s")]
    NonMonotonicTime { previous: f64, now: f64 },

    #[error("Startup timed out after {waited_ms} ms")]
    StartupTimeout { waited_ms: u64 },

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_self_consistent() {
        let p = ActuatorParams::default();
        assert!(p.min_rotation_rad <= p.max_rotation_rad);
        assert!(p.max_velocity_rad_s > 0.0);
        assert!(p.max_torque_nm > 0.0);
    }

    #[test]
    fn partial_params_fill_in_defaults() {
        let p: ActuatorParams = serde_json::from_str(r#"{"max_torque_nm": 2.5}"#).unwrap();
        assert!((p.max_torque_nm - 2.5).abs() < f64::EPSILON);
        assert!((p.max_rotation_rad - ActuatorParams::DEFAULT_MAX_ROTATION_RAD).abs() < f64::EPSILON);
    }

    #[test]
    fn drive_intent_uses_tagged_layout() {
        let intent = DriveIntent::SetMotorPower {
            left: 0.5,
            right: -0.5,
        };
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["action"], "SetMotorPower");
        assert_eq!(json["payload"]["left"], 0.5);

        let back: DriveIntent = serde_json::from_value(json).unwrap();
        assert_eq!(back, intent);
    }

    #[test]
    fn all_stop_parses_without_payload() {
        let back: DriveIntent = serde_json::from_str(r#"{"action":"AllStop"}"#).unwrap();
        assert!(matches!(back, DriveIntent::AllStop));
    }

    #[test]
    fn drive_error_display() {
        let err = DriveError::NonMonotonicTime {
            previous: 2.0,
            now: 1.5,
        };
        assert!(err.to_string().contains("Non-monotonic"));

        let err = DriveError::HardwareFault {
            component: "pan_joint".to_string(),
            details: "write rejected".to_string(),
        };
        assert!(err.to_string().contains("pan_joint"));
    }
}
