//! [`DriveRig`] – the host-side per-tick driver and intent dispatcher.
//!
//! A rig groups the servos and the (optional) differential-drive unit of one
//! simulated robot together with the joint handles they act on.  The host
//! calls [`DriveRig::step`] once per simulation step and
//! [`DriveRig::dispatch`] whenever a [`DriveIntent`] arrives from a
//! higher-level command source.
//!
//! Per tick each servo joint is read once (inside the servo) and written once
//! (here), and each wheel joint is written once with its encoder velocity.
//! Writes happen only after every component has computed its output.
//!
//! # Example
//!
//! ```rust
//! use servodrive_hal::drive::DifferentialDriveUnit;
//! use servodrive_hal::joint::handle;
//! use servodrive_hal::rig::DriveRig;
//! use servodrive_hal::servo::ServoActuator;
//! use servodrive_hal::sim::SimJoint;
//! use servodrive_types::DriveIntent;
//!
//! let pan = SimJoint::new("pan_joint").shared();
//! let left = SimJoint::new("left_wheel").shared();
//! let right = SimJoint::new("right_wheel").shared();
//!
//! let mut rig = DriveRig::builder()
//!     .with_servo(ServoActuator::with_defaults("pan_joint", handle(&pan)).unwrap())
//!     .with_drive(DifferentialDriveUnit::default(), handle(&left), handle(&right))
//!     .build();
//!
//! rig.dispatch(DriveIntent::SetMotorPower { left: 0.5, right: 0.5 }).unwrap();
//! let telemetry = rig.step(0.01).unwrap();
//! assert!(telemetry.encoders.unwrap().left > 0.0);
//! ```

use servodrive_types::{DriveError, DriveIntent, TickTelemetry};
use tracing::{info, warn};

use crate::drive::DifferentialDriveUnit;
use crate::joint::{upgrade, ActuatedJoint, JointHandle};
use crate::motor::{LinearVelocityModel, VelocityModel};
use crate::servo::ServoActuator;
use crate::sim::SimJoint;

/// Component name used in faults raised for the drive base.
pub const DRIVE_BASE: &str = "drive_base";

struct WheelDrive<J: ActuatedJoint, M: VelocityModel> {
    unit: DifferentialDriveUnit<M>,
    left: JointHandle<J>,
    left_id: String,
    right: JointHandle<J>,
    right_id: String,
}

/// Id reported by the joint behind `handle`, or `fallback` if it is gone.
fn joint_id<J: ActuatedJoint>(handle: &JointHandle<J>, fallback: &str) -> String {
    match handle.upgrade() {
        Some(joint) => {
            let id = joint.borrow().id().to_string();
            id
        }
        None => fallback.to_string(),
    }
}

/// Servos plus an optional differential drive, ticked together.
pub struct DriveRig<J: ActuatedJoint = SimJoint, M: VelocityModel = LinearVelocityModel> {
    servos: Vec<ServoActuator<J>>,
    drive: Option<WheelDrive<J, M>>,
    last_tick: Option<f64>,
}

impl<J: ActuatedJoint, M: VelocityModel> DriveRig<J, M> {
    /// Start building a rig.
    pub fn builder() -> DriveRigBuilder<J, M> {
        DriveRigBuilder::default()
    }

    /// Run one simulation tick at time `time`.
    ///
    /// Every joint handle is resolved first, then all servo poses and the
    /// drive unit's encoder velocities are computed, and only then are the
    /// results written to the joints.
    ///
    /// # Errors
    ///
    /// - [`DriveError::NonMonotonicTime`] when `time` precedes the previous
    ///   tick; nothing is applied.
    /// - [`DriveError::InvalidActuatorHandle`] when a joint has gone away;
    ///   detected before any component advances, so nothing is applied.
    /// - [`DriveError::HardwareFault`] when a joint rejects a write.  Servo
    ///   and drive state has already advanced to `time` and writes ahead of
    ///   the failing joint stay applied.  The rig's own clock does not move,
    ///   so repeating `step(time)` re-writes the same outputs.
    pub fn step(&mut self, time: f64) -> Result<TickTelemetry, DriveError> {
        if let Some(previous) = self.last_tick
            && !(time >= previous)
        {
            warn!(previous, now = time, "rig tick rejected");
            return Err(DriveError::NonMonotonicTime {
                previous,
                now: time,
            });
        }

        let servo_joints = self
            .servos
            .iter()
            .map(|servo| upgrade(servo.joint(), servo.id()))
            .collect::<Result<Vec<_>, _>>()?;
        let wheel_joints = match &self.drive {
            Some(drive) => Some((
                upgrade(&drive.left, &drive.left_id)?,
                upgrade(&drive.right, &drive.right_id)?,
            )),
            None => None,
        };

        let mut servo_poses = Vec::with_capacity(self.servos.len());
        for servo in &mut self.servos {
            let pose = servo.compute_new_pose(time)?;
            servo_poses.push((servo.id().to_string(), pose));
        }
        let encoders = match &mut self.drive {
            Some(drive) => Some(drive.unit.on_simulation_tick(time)?),
            None => None,
        };

        for (joint, (_, pose)) in servo_joints.iter().zip(&servo_poses) {
            joint.borrow_mut().set_position(*pose)?;
        }
        if let (Some((left, right)), Some(enc)) = (&wheel_joints, encoders) {
            left.borrow_mut().set_velocity(enc.left)?;
            right.borrow_mut().set_velocity(enc.right)?;
        }

        self.last_tick = Some(time);
        Ok(TickTelemetry {
            time_s: time,
            servo_poses,
            encoders,
        })
    }

    /// Route a [`DriveIntent`] to the servo or drive unit it names.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::HardwareFault`] when the intent names a servo
    /// that is not registered or a drive command reaches a rig without a
    /// drive unit.  `AllStop` can also fail with
    /// [`DriveError::InvalidActuatorHandle`] if a servo's joint is gone.
    pub fn dispatch(&mut self, intent: DriveIntent) -> Result<(), DriveError> {
        match intent {
            DriveIntent::SetServoTarget {
                joint_id,
                target_rad,
            } => {
                let servo = self
                    .servos
                    .iter_mut()
                    .find(|s| s.id() == joint_id)
                    .ok_or_else(|| DriveError::HardwareFault {
                        component: joint_id.clone(),
                        details: format!("servo '{joint_id}' is not registered"),
                    })?;
                servo.pid_mut().set_target(target_rad);
                Ok(())
            }

            DriveIntent::SetMotorPower { left, right } => {
                self.drive_unit_mut()?.set_motor_commands(left, right);
                Ok(())
            }

            // Hold every servo at its measured pose and cut wheel power.
            DriveIntent::AllStop => {
                for servo in &mut self.servos {
                    let measured = upgrade(servo.joint(), servo.id())?.borrow().position();
                    let hold = servo.limits().clamp_pose(measured);
                    servo.pid_mut().set_target(hold);
                }
                if let Some(drive) = &mut self.drive {
                    drive.unit.all_stop();
                }
                info!("all stop");
                Ok(())
            }
        }
    }

    pub fn servo(&self, id: &str) -> Option<&ServoActuator<J>> {
        self.servos.iter().find(|s| s.id() == id)
    }

    pub fn servos(&self) -> &[ServoActuator<J>] {
        &self.servos
    }

    pub fn drive_unit(&self) -> Option<&DifferentialDriveUnit<M>> {
        self.drive.as_ref().map(|d| &d.unit)
    }

    fn drive_unit_mut(&mut self) -> Result<&mut DifferentialDriveUnit<M>, DriveError> {
        self.drive
            .as_mut()
            .map(|d| &mut d.unit)
            .ok_or_else(|| DriveError::HardwareFault {
                component: DRIVE_BASE.to_string(),
                details: "no drive unit is registered".to_string(),
            })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

/// Builder for [`DriveRig`].
///
/// Registering a servo whose id is already taken replaces the old one.
pub struct DriveRigBuilder<J: ActuatedJoint = SimJoint, M: VelocityModel = LinearVelocityModel> {
    servos: Vec<ServoActuator<J>>,
    drive: Option<WheelDrive<J, M>>,
}

impl<J: ActuatedJoint, M: VelocityModel> Default for DriveRigBuilder<J, M> {
    fn default() -> Self {
        Self {
            servos: Vec::new(),
            drive: None,
        }
    }
}

impl<J: ActuatedJoint, M: VelocityModel> DriveRigBuilder<J, M> {
    pub fn with_servo(mut self, servo: ServoActuator<J>) -> Self {
        self.servos.retain(|s| s.id() != servo.id());
        self.servos.push(servo);
        self
    }

    /// Attach a drive unit and the wheel joints its encoders are written to.
    pub fn with_drive(
        mut self,
        unit: DifferentialDriveUnit<M>,
        left: JointHandle<J>,
        right: JointHandle<J>,
    ) -> Self {
        let left_id = joint_id(&left, "left_wheel");
        let right_id = joint_id(&right, "right_wheel");
        self.drive = Some(WheelDrive {
            unit,
            left,
            left_id,
            right,
            right_id,
        });
        self
    }

    pub fn build(self) -> DriveRig<J, M> {
        DriveRig {
            servos: self.servos,
            drive: self.drive,
            last_tick: None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
