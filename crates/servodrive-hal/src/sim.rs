//! In-process simulated joint for headless runs and tests.
//!
//! [`SimJoint`] stands in for the host simulation's joint object: it records
//! the most recently written pose and velocity and reports them back as the
//! measurement.  This lets the full control stack run in CI without a
//! physics engine.
//!
//! # Example
//!
//! ```rust
//! use servodrive_hal::joint::ActuatedJoint;
//! use servodrive_hal::sim::SimJoint;
//!
//! let mut joint = SimJoint::new("left_wheel");
//! joint.set_velocity(4.0).unwrap();
//! assert_eq!(joint.velocity(), 4.0);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use servodrive_types::DriveError;

use crate::joint::ActuatedJoint;

/// A simulated joint that echoes back whatever was last written to it.
#[derive(Debug, Clone, PartialEq)]
pub struct SimJoint {
    id: String,
    position: f64,
    velocity: f64,
    fault: Option<String>,
    writes: usize,
}

impl SimJoint {
    /// Create a joint at rest at pose zero.
    pub fn new(id: impl Into<String>) -> Self {
        Self::at(id, 0.0)
    }

    /// Create a joint at rest at `position`.
    pub fn at(id: impl Into<String>, position: f64) -> Self {
        Self {
            id: id.into(),
            position,
            velocity: 0.0,
            fault: None,
            writes: 0,
        }
    }

    /// Make every write fail with `details`.
    pub fn with_fault(mut self, details: impl Into<String>) -> Self {
        self.fault = Some(details.into());
        self
    }

    /// Let writes succeed again.
    pub fn clear_fault(&mut self) {
        self.fault = None;
    }

    /// Wrap the joint for shared host ownership.
    pub fn shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    /// Number of successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    fn check_fault(&self) -> Result<(), DriveError> {
        match &self.fault {
            Some(details) => Err(DriveError::HardwareFault {
                component: self.id.clone(),
                details: details.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl ActuatedJoint for SimJoint {
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
        self.check_fault()?;
        self.position = pose_rad;
        self.writes += 1;
        Ok(())
    }

    fn set_velocity(&mut self, velocity_rad_s: f64) -> Result<(), DriveError> {
        self.check_fault()?;
        self.velocity = velocity_rad_s;
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_joint_records_position_and_velocity() {
        let mut joint = SimJoint::new("pan");
        assert_eq!(joint.position(), 0.0);
        joint.set_position(1.2).unwrap();
        joint.set_velocity(-0.4).unwrap();
        assert!((joint.position() - 1.2).abs() < f64::EPSILON);
        assert!((joint.velocity() + 0.4).abs() < f64::EPSILON);
        assert_eq!(joint.writes(), 2);
    }

    #[test]
    fn sim_joint_starts_at_given_pose() {
        let joint = SimJoint::at("tilt", -0.3);
        assert_eq!(joint.id(), "tilt");
        assert!((joint.position() + 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn faulted_joint_rejects_writes() {
        let mut joint = SimJoint::at("pan", 0.2).with_fault("overcurrent");
        let err = joint.set_position(1.0).unwrap_err();
        assert_eq!(
            err,
            DriveError::HardwareFault {
                component: "pan".to_string(),
                details: "overcurrent".to_string()
            }
        );
        assert!((joint.position() - 0.2).abs() < f64::EPSILON);
        assert_eq!(joint.writes(), 0);
    }
}
