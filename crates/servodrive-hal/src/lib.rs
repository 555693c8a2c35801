//! `servodrive-hal` – Actuator control core
//!
//! Closed-loop servo control and open-loop wheel motor models for a
//! simulated mobile robot.  Everything here is synchronous and runs inside
//! the host simulation's per-step callback.
//!
//! # Modules
//!
//! - [`limits`] – [`ActuatorLimits`][limits::ActuatorLimits]: validated,
//!   immutable rotation/velocity/torque bounds.
//! - [`pid`] – [`PidController`][pid::PidController]: timestamped PID with
//!   integral and derivative memory.
//! - [`joint`] – [`ActuatedJoint`][joint::ActuatedJoint]: the host's joint
//!   object, reached through a non-owning [`JointHandle`][joint::JointHandle].
//! - [`servo`] – [`ServoActuator`][servo::ServoActuator]: turns PID output
//!   into a bounded pose each tick.
//! - [`motor`] – [`PowerVelocityMotor`][motor::PowerVelocityMotor] and the
//!   swappable [`VelocityModel`][motor::VelocityModel] strategies.
//! - [`drive`] – [`DifferentialDriveUnit`][drive::DifferentialDriveUnit]:
//!   two wheel motors plus encoder readout.
//! - [`rig`] – [`DriveRig`][rig::DriveRig]: per-tick host driver and
//!   [`DriveIntent`][servodrive_types::DriveIntent] dispatcher.
//! - [`startup`] – bounded readiness wait for host integration.
//! - [`sim`] – [`SimJoint`][sim::SimJoint]: in-process joint stub.

pub mod drive;
pub mod joint;
pub mod limits;
pub mod motor;
pub mod pid;
pub mod rig;
pub mod servo;
pub mod sim;
pub mod startup;

pub use drive::DifferentialDriveUnit;
pub use joint::{ActuatedJoint, JointHandle};
pub use limits::ActuatorLimits;
pub use motor::{FirstOrderLagModel, LinearVelocityModel, PowerVelocityMotor, VelocityModel, VelocityStep};
pub use pid::PidController;
pub use rig::{DriveRig, DriveRigBuilder};
pub use servo::ServoActuator;
pub use sim::SimJoint;
pub use startup::{wait_until_ready, StartupPolicy};
