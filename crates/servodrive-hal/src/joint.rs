//! The `ActuatedJoint` trait: the host simulation's view of one joint.
//!
//! The host owns each joint (`Rc<RefCell<J>>`) and hands the control core a
//! [`JointHandle`], a non-owning `Weak` reference.  A handle that can no
//! longer be upgraded is treated as null.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use servodrive_types::DriveError;

/// A simulated joint whose pose and velocity can be read and written.
pub trait ActuatedJoint {
    /// Stable identifier, e.g. `"pan_joint"` or `"left_wheel"`.
    fn id(&self) -> &str;

    /// Current measured angular position, radians.
    fn position(&self) -> f64;

    /// Current measured angular velocity, rad/s.
    fn velocity(&self) -> f64;

    /// Command the joint to `pose_rad`.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::HardwareFault`] if the host rejects the write.
    fn set_position(&mut self, pose_rad: f64) -> Result<(), DriveError>;

    /// Command the joint to spin at `velocity_rad_s`.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::HardwareFault`] if the host rejects the write.
    fn set_velocity(&mut self, velocity_rad_s: f64) -> Result<(), DriveError>;
}

/// Non-owning reference to a host-owned joint.
pub type JointHandle<J> = Weak<RefCell<J>>;

/// Downgrade a host-owned joint into a [`JointHandle`].
pub fn handle<J>(joint: &Rc<RefCell<J>>) -> JointHandle<J> {
    Rc::downgrade(joint)
}

/// Upgrade `handle`, failing with [`DriveError::InvalidActuatorHandle`] when
/// the host has dropped (or never created) the joint.
pub fn upgrade<J>(handle: &JointHandle<J>, joint: &str) -> Result<Rc<RefCell<J>>, DriveError> {
    handle
        .upgrade()
        .ok_or_else(|| DriveError::InvalidActuatorHandle {
            joint: joint.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process joint used only for tests.
    #[derive(Debug)]
    struct MockJoint {
        id: String,
        position: f64,
        velocity: f64,
    }

    impl MockJoint {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                position: 0.0,
                velocity: 0.0,
            }
        }
    }

    impl ActuatedJoint for MockJoint {
        fn id(&self) -> &str {
            &self.id
        }

        fn position(&self) -> f64 {
            self.position
        }

        fn velocity(&self) -> f64 {
            self.velocity
        }

        fn set_position(&mut self, pose_rad: f64) -> Result<(), DriveError> {
            self.position = pose_rad;
            Ok(())
        }

        fn set_velocity(&mut self, velocity_rad_s: f64) -> Result<(), DriveError> {
            self.velocity = velocity_rad_s;
            Ok(())
        }
    }

    #[test]
    fn handle_reads_and_writes_through_to_host_joint() {
        let joint = Rc::new(RefCell::new(MockJoint::new("tilt")));
        let h = handle(&joint);

        let live = upgrade(&h, "tilt").unwrap();
        live.borrow_mut()
            .set_position(std::f64::consts::FRAC_PI_4)
            .unwrap();
        assert_eq!(live.borrow().id(), "tilt");
        assert!((joint.borrow().position() - std::f64::consts::FRAC_PI_4).abs() < f64::EPSILON);
    }

    #[test]
    fn handle_does_not_keep_joint_alive() {
        let joint = Rc::new(RefCell::new(MockJoint::new("tilt")));
        let h = handle(&joint);
        drop(joint);

        let err = upgrade(&h, "tilt").unwrap_err();
        assert_eq!(
            err,
            DriveError::InvalidActuatorHandle {
                joint: "tilt".to_string()
            }
        );
    }

    #[test]
    fn empty_handle_is_invalid() {
        let h: JointHandle<MockJoint> = Weak::new();
        assert!(upgrade(&h, "ghost").is_err());
    }
}
