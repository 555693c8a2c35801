//! [`ServoActuator`] – PID-driven position servo for one actuated joint.
//!
//! Each simulation tick the host calls
//! [`compute_new_pose`](ServoActuator::compute_new_pose) with the current
//! simulation time.  The servo reads the joint's measured pose, asks its
//! [`PidController`] for a velocity command, and integrates that command into
//! a new pose bounded by its [`ActuatorLimits`].  Writing the pose back to
//! the joint is left to the caller.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use servodrive_hal::joint::handle;
//! use servodrive_hal::servo::ServoActuator;
//! use servodrive_hal::sim::SimJoint;
//!
//! let joint = Rc::new(RefCell::new(SimJoint::new("pan_joint")));
//! let mut servo = ServoActuator::with_defaults("pan_joint", handle(&joint)).unwrap();
//! servo.pid_mut().set_target(0.5);
//!
//! servo.compute_new_pose(0.00).unwrap(); // first tick primes the controller
//! let pose = servo.compute_new_pose(0.01).unwrap();
//! assert!(pose > 0.0);
//! ```

use servodrive_types::{ActuatorParams, DriveError, PidGains};
use tracing::{debug, trace, warn};

use crate::joint::{upgrade, ActuatedJoint, JointHandle};
use crate::limits::ActuatorLimits;
use crate::pid::PidController;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    pose: f64,
    time: f64,
}

/// A position servo bound to one host joint.
///
/// Owns its limits and controller by value; only borrows the joint.
#[derive(Debug)]
pub struct ServoActuator<J: ActuatedJoint> {
    id: String,
    joint: JointHandle<J>,
    limits: ActuatorLimits,
    pid: PidController,
    previous: Option<Sample>,
    last_velocity: f64,
}

impl<J: ActuatedJoint> ServoActuator<J> {
    /// Build a servo from explicit limits and controller.
    ///
    /// Every other constructor funnels through this one.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::InvalidActuatorHandle`] when `joint` does not
    /// point at a live host joint.
    pub fn new(
        id: impl Into<String>,
        joint: JointHandle<J>,
        limits: ActuatorLimits,
        pid: PidController,
    ) -> Result<Self, DriveError> {
        let id = id.into();
        if joint.upgrade().is_none() {
            warn!(joint = %id, "servo constructed with an invalid joint handle");
            return Err(DriveError::InvalidActuatorHandle { joint: id });
        }
        Ok(Self {
            id,
            joint,
            limits,
            pid,
            previous: None,
            last_velocity: 0.0,
        })
    }

    /// Build a servo with explicit limits and a default controller.
    pub fn with_limits(
        id: impl Into<String>,
        joint: JointHandle<J>,
        limits: ActuatorLimits,
    ) -> Result<Self, DriveError> {
        Self::new(id, joint, limits, PidController::default())
    }

    /// Build a servo with default limits and a default controller.
    pub fn with_defaults(id: impl Into<String>, joint: JointHandle<J>) -> Result<Self, DriveError> {
        Self::new(id, joint, ActuatorLimits::default(), PidController::default())
    }

    /// Build a servo from raw params and gains, validating the params.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::InvalidActuatorParams`] for bad params, or
    /// [`DriveError::InvalidActuatorHandle`] for a dead handle.
    pub fn from_params(
        id: impl Into<String>,
        joint: JointHandle<J>,
        params: ActuatorParams,
        gains: PidGains,
    ) -> Result<Self, DriveError> {
        let limits = ActuatorLimits::new(params)?;
        Self::new(id, joint, limits, PidController::new(gains))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn limits(&self) -> &ActuatorLimits {
        &self.limits
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    /// Mutable access to the controller, e.g. for `set_target`.
    pub fn pid_mut(&mut self) -> &mut PidController {
        &mut self.pid
    }

    /// The joint this servo drives.
    pub fn joint(&self) -> &JointHandle<J> {
        &self.joint
    }

    /// Pose returned by the last successful tick, if any.
    pub fn last_pose(&self) -> Option<f64> {
        self.previous.map(|s| s.pose)
    }

    /// Velocity implied by the last pose change, rad/s.
    pub fn last_velocity(&self) -> f64 {
        self.last_velocity
    }

    /// Compute the next commanded pose at simulation time `time`.
    ///
    /// The PID output is treated as a velocity command: the pose change over
    /// `dt` is limited to `±max_velocity * dt`, added to the previous pose and
    /// finally clamped into the rotation range.  On the first tick the
    /// measured pose (clamped into range) is returned as-is and the
    /// controller is restarted at `time`, so no error is integrated over the
    /// interval before the servo's first tick.
    ///
    /// # Errors
    ///
    /// - [`DriveError::NonMonotonicTime`] when `time` precedes the last tick.
    /// - [`DriveError::InvalidActuatorHandle`] when the host dropped the joint.
    ///
    /// In both cases the servo's state is left untouched.
    pub fn compute_new_pose(&mut self, time: f64) -> Result<f64, DriveError> {
        if let Some(prev) = self.previous
            && !(time >= prev.time)
        {
            warn!(servo = %self.id, previous = prev.time, now = time, "servo tick rejected");
            return Err(DriveError::NonMonotonicTime {
                previous: prev.time,
                now: time,
            });
        }

        let measured = upgrade(&self.joint, &self.id)?.borrow().position();

        // The controller's clock starts with the servo's first tick.
        if self.previous.is_none() {
            if time.is_nan() {
                warn!(servo = %self.id, "servo tick rejected: time is NaN");
                return Err(DriveError::NonMonotonicTime {
                    previous: self.pid.timestamp(),
                    now: time,
                });
            }
            self.pid.restart_at(time);
        }

        let output = self.pid.update(measured, time)?;

        let Some(prev) = self.previous else {
            let pose = self.limits.clamp_pose(measured);
            self.previous = Some(Sample { pose, time });
            self.last_velocity = 0.0;
            trace!(servo = %self.id, pose, "servo primed");
            return Ok(pose);
        };

        let dt = time - prev.time;
        if dt == 0.0 {
            return Ok(prev.pose);
        }

        let raw_step = output * dt;
        let step = self.limits.clamp_step(raw_step, dt);
        if step != raw_step {
            debug!(servo = %self.id, raw_step, step, "servo velocity clamped");
        }

        let candidate = prev.pose + step;
        let pose = self.limits.clamp_pose(candidate);
        if pose != candidate {
            debug!(servo = %self.id, candidate, pose, "servo pose clamped to range");
        }

        self.last_velocity = (pose - prev.pose) / dt;
        self.previous = Some(Sample { pose, time });
        trace!(servo = %self.id, time, measured, output, pose, "servo tick");
        Ok(pose)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::{Rc, Weak};

    use super::*;
    use crate::joint::handle;

    #[derive(Debug)]
    struct MockJoint {
        position: f64,
    }

    impl ActuatedJoint for MockJoint {
        fn id(&self) -> &str {
            "mock"
        }
        fn position(&self) -> f64 {
            self.position
        }
        fn velocity(&self) -> f64 {
            0.0
        }
        fn set_position(&mut self, pose_rad: f64) -> Result<(), DriveError> {
            self.position = pose_rad;
            Ok(())
        }
        fn set_velocity(&mut self, _velocity_rad_s: f64) -> Result<(), DriveError> {
            Ok(())
        }
    }

    fn joint_at(position: f64) -> Rc<RefCell<MockJoint>> {
        Rc::new(RefCell::new(MockJoint { position }))
    }

    fn limits(min: f64, max: f64, max_velocity: f64) -> ActuatorLimits {
        ActuatorLimits::new(ActuatorParams {
            min_rotation_rad: min,
            max_rotation_rad: max,
            max_velocity_rad_s: max_velocity,
            max_torque_nm: 1.0,
        })
        .unwrap()
    }

    /// Tick once and write the pose back, the way a host would.
    fn tick(servo: &mut ServoActuator<MockJoint>, joint: &Rc<RefCell<MockJoint>>, t: f64) -> f64 {
        let pose = servo.compute_new_pose(t).unwrap();
        joint.borrow_mut().set_position(pose).unwrap();
        pose
    }

    #[test]
    fn dead_handle_is_rejected_at_construction() {
        let handle: JointHandle<MockJoint> = Weak::new();
        let err = ServoActuator::with_defaults("pan", handle).unwrap_err();
        assert_eq!(
            err,
            DriveError::InvalidActuatorHandle {
                joint: "pan".to_string()
            }
        );
    }

    #[test]
    fn bad_params_are_rejected_before_handle_is_used() {
        let joint = joint_at(0.0);
        let params = ActuatorParams {
            max_velocity_rad_s: -1.0,
            ..Default::default()
        };
        let err =
            ServoActuator::from_params("pan", handle(&joint), params, PidGains::default()).unwrap_err();
        assert!(matches!(err, DriveError::InvalidActuatorParams { .. }));
    }

    #[test]
    fn default_overloads_apply_defaults() {
        let joint = joint_at(0.0);
        let servo = ServoActuator::with_limits("pan", handle(&joint), limits(-1.0, 1.0, 2.0)).unwrap();
        assert_eq!(servo.pid().gains(), PidGains::default());
        assert_eq!(servo.pid().target(), 0.0);
        assert_eq!(servo.pid().timestamp(), 0.0);

        let servo = ServoActuator::with_defaults("pan", handle(&joint)).unwrap();
        assert_eq!(*servo.limits(), ActuatorLimits::default());
        assert!(servo.last_pose().is_none());
    }

    #[test]
    fn first_tick_returns_measured_pose() {
        let joint = joint_at(0.3);
        let mut servo = ServoActuator::with_defaults("pan", handle(&joint)).unwrap();
        servo.pid_mut().set_target(1.0);
        let pose = servo.compute_new_pose(0.5).unwrap();
        assert!((pose - 0.3).abs() < f64::EPSILON);
        assert_eq!(servo.last_velocity(), 0.0);
    }

    #[test]
    fn late_first_tick_does_not_wind_up_integral() {
        let joint = joint_at(0.0);
        let mut servo = ServoActuator::new(
            "pan",
            handle(&joint),
            limits(-2.0, 2.0, 10.0),
            PidController::new(PidGains::new(0.0, 1.0, 0.0)),
        )
        .unwrap();
        servo.pid_mut().set_target(1.0);

        let pose = tick(&mut servo, &joint, 100.0);
        assert_eq!(pose, 0.0);
        assert_eq!(servo.pid().integral(), 0.0);
        assert!((servo.pid().timestamp() - 100.0).abs() < f64::EPSILON);

        // integral 0.01 → output 0.01 rad/s → 1e-4 rad over 0.01 s
        let pose = tick(&mut servo, &joint, 100.01);
        assert!((pose - 1e-4).abs() < 1e-9, "pose {pose}");
    }

    #[test]
    fn nan_first_tick_is_rejected() {
        let joint = joint_at(0.0);
        let mut servo = ServoActuator::with_defaults("pan", handle(&joint)).unwrap();
        let err = servo.compute_new_pose(f64::NAN).unwrap_err();
        assert!(matches!(err, DriveError::NonMonotonicTime { .. }));
        assert!(servo.last_pose().is_none());
        assert!(servo.compute_new_pose(0.0).is_ok());
    }

    #[test]
    fn first_tick_clamps_out_of_range_measurement() {
        let joint = joint_at(3.0);
        let mut servo = ServoActuator::with_limits("pan", handle(&joint), limits(-1.0, 1.0, 2.0)).unwrap();
        let pose = servo.compute_new_pose(0.0).unwrap();
        assert!((pose - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn proportional_step_integrates_output() {
        let joint = joint_at(0.0);
        let mut servo = ServoActuator::new(
            "pan",
            handle(&joint),
            limits(-1.0, 1.0, 10.0),
            PidController::new(PidGains::new(2.0, 0.0, 0.0)),
        )
        .unwrap();
        servo.pid_mut().set_target(0.5);

        tick(&mut servo, &joint, 0.0);
        // error 0.5 → output 1.0 rad/s → 0.1 rad over 0.1 s
        let pose = tick(&mut servo, &joint, 0.1);
        assert!((pose - 0.1).abs() < 1e-9);
        assert!((servo.last_velocity() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn velocity_clamp_limits_step_size() {
        let joint = joint_at(0.0);
        let mut servo = ServoActuator::new(
            "pan",
            handle(&joint),
            limits(-1.0, 1.0, 0.5),
            PidController::new(PidGains::new(100.0, 0.0, 0.0)),
        )
        .unwrap();
        servo.pid_mut().set_target(1.0);

        tick(&mut servo, &joint, 0.0);
        let pose = tick(&mut servo, &joint, 0.1);
        // 0.5 rad/s * 0.1 s
        assert!((pose - 0.05).abs() < 1e-9);
        assert!((servo.last_velocity() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn converges_to_target_within_range() {
        let joint = joint_at(0.0);
        let mut servo = ServoActuator::new(
            "pan",
            handle(&joint),
            limits(-1.0, 1.0, 5.0),
            PidController::new(PidGains::new(8.0, 0.0, 0.0)),
        )
        .unwrap();
        servo.pid_mut().set_target(0.6);

        let mut pose = 0.0;
        for step in 0..=300 {
            pose = tick(&mut servo, &joint, step as f64 * 0.01);
        }
        assert!((pose - 0.6).abs() < 1e-3, "pose {pose} did not settle");
    }

    #[test]
    fn target_beyond_range_stops_at_limit() {
        let joint = joint_at(0.0);
        let mut servo = ServoActuator::new(
            "pan",
            handle(&joint),
            limits(-0.4, 0.4, 5.0),
            PidController::new(PidGains::new(1.0e6, 1.0e6, 1.0e6)),
        )
        .unwrap();
        servo.pid_mut().set_target(-10.0);

        for step in 0..100 {
            let pose = tick(&mut servo, &joint, step as f64 * 0.02);
            assert!((-0.4..=0.4).contains(&pose));
        }
        assert!((servo.last_pose().unwrap() + 0.4).abs() < 1e-9);
    }

    #[test]
    fn duplicate_timestamp_holds_pose() {
        let joint = joint_at(0.0);
        let mut servo = ServoActuator::with_defaults("pan", handle(&joint)).unwrap();
        servo.pid_mut().set_target(0.5);
        tick(&mut servo, &joint, 0.0);
        let pose = tick(&mut servo, &joint, 0.05);
        let again = tick(&mut servo, &joint, 0.05);
        assert_eq!(pose, again);
    }

    #[test]
    fn backwards_tick_fails_and_keeps_state() {
        let joint = joint_at(0.0);
        let mut servo = ServoActuator::with_defaults("pan", handle(&joint)).unwrap();
        servo.pid_mut().set_target(0.5);
        tick(&mut servo, &joint, 0.0);
        let pose = tick(&mut servo, &joint, 0.1);

        let err = servo.compute_new_pose(0.05).unwrap_err();
        assert!(matches!(err, DriveError::NonMonotonicTime { .. }));
        assert_eq!(servo.last_pose(), Some(pose));
        assert!((servo.pid().timestamp() - 0.1).abs() < f64::EPSILON);

        // The next valid tick resumes from the last good state.
        assert!(servo.compute_new_pose(0.2).is_ok());
    }

    #[test]
    fn dropped_joint_fails_tick() {
        let joint = joint_at(0.0);
        let mut servo = ServoActuator::with_defaults("pan", handle(&joint)).unwrap();
        servo.compute_new_pose(0.0).unwrap();
        drop(joint);
        assert!(matches!(
            servo.compute_new_pose(0.1),
            Err(DriveError::InvalidActuatorHandle { .. })
        ));
        assert!((servo.pid().timestamp() - 0.0).abs() < f64::EPSILON);
    }
}
