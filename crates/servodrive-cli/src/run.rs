//! Headless fixed-step simulation of one pan servo and a differential drive.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use servodrive_hal::joint::handle;
use servodrive_hal::{
    wait_until_ready, ActuatorLimits, DifferentialDriveUnit, DriveRig, PidController,
    ServoActuator, SimJoint, VelocityModel,
};
use servodrive_types::{DriveIntent, TickTelemetry};
use tracing::{info, warn};

use crate::config::{Config, MotorModelChoice};

/// How the per-tick telemetry is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// One JSON object per tick.
    Json,
    /// Human-readable lines every `every` ticks.
    Text { every: u64 },
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub ticks: u64,
    pub stopped_early: bool,
    pub last: Option<TickTelemetry>,
}

/// Run the scenario described by `cfg` for `steps` ticks after t = 0.
pub fn run(
    cfg: &Config,
    steps: u64,
    output: Output,
    shutdown: &Arc<AtomicBool>,
    out: &mut impl Write,
) -> Result<Summary, String> {
    match cfg.drive.model()? {
        MotorModelChoice::Linear(model) => simulate(cfg, model, steps, output, shutdown, out),
        MotorModelChoice::Lag(model) => simulate(cfg, model, steps, output, shutdown, out),
    }
}

fn simulate<M: VelocityModel + Clone>(
    cfg: &Config,
    model: M,
    steps: u64,
    output: Output,
    shutdown: &Arc<AtomicBool>,
    out: &mut impl Write,
) -> Result<Summary, String> {
    let limits = ActuatorLimits::new(cfg.servo.limits).map_err(|e| e.to_string())?;

    // The host owns the joints; the rig only holds weak handles.
    let pan = SimJoint::at(cfg.servo.id.clone(), cfg.servo.start_rad).shared();
    let left = SimJoint::new("left_wheel").shared();
    let right = SimJoint::new("right_wheel").shared();

    let servo = ServoActuator::new(
        cfg.servo.id.clone(),
        handle(&pan),
        limits,
        PidController::new(cfg.servo.gains),
    )
    .map_err(|e| e.to_string())?;

    let mut rig = DriveRig::builder()
        .with_servo(servo)
        .with_drive(DifferentialDriveUnit::new(model), handle(&left), handle(&right))
        .build();

    let handles = [handle(&pan), handle(&left), handle(&right)];
    wait_until_ready(
        || handles.iter().all(|h| h.upgrade().is_some()),
        cfg.sim.startup_policy(),
    )
    .map_err(|e| e.to_string())?;

    rig.dispatch(DriveIntent::SetServoTarget {
        joint_id: cfg.servo.id.clone(),
        target_rad: cfg.servo.target_rad,
    })
    .map_err(|e| e.to_string())?;
    rig.dispatch(DriveIntent::SetMotorPower {
        left: cfg.drive.left_power,
        right: cfg.drive.right_power,
    })
    .map_err(|e| e.to_string())?;

    info!(steps, step_s = cfg.sim.step_s, "simulation started");

    let mut summary = Summary {
        ticks: 0,
        stopped_early: false,
        last: None,
    };
    for i in 0..=steps {
        if shutdown.load(Ordering::SeqCst) {
            warn!(tick = i, "shutdown requested; stopping all actuators");
            rig.dispatch(DriveIntent::AllStop).map_err(|e| e.to_string())?;
            summary.stopped_early = true;
            break;
        }

        let time = i as f64 * cfg.sim.step_s;
        let telemetry = rig.step(time).map_err(|e| e.to_string())?;
        emit(&telemetry, i, output, out)?;
        summary.ticks += 1;
        summary.last = Some(telemetry);
    }

    info!(ticks = summary.ticks, "simulation finished");
    Ok(summary)
}

fn emit(t: &TickTelemetry, tick: u64, output: Output, out: &mut impl Write) -> Result<(), String> {
    let line = match output {
        Output::Json => serde_json::to_string(t).map_err(|e| e.to_string())?,
        Output::Text { every } => {
            if every == 0 || tick % every != 0 {
                return Ok(());
            }
            format_text(t)
        }
    };
    writeln!(out, "{line}").map_err(|e| e.to_string())
}

fn format_text(t: &TickTelemetry) -> String {
    let mut line = format!("  t={:>7.3}s", t.time_s);
    for (id, pose) in &t.servo_poses {
        line.push_str(&format!("  {}={:+.4} rad", id.bold(), pose));
    }
    if let Some(enc) = t.encoders {
        line.push_str(&format!(
            "  {} L={:+.3} R={:+.3} rad/s",
            "encoders".dimmed(),
            enc.left,
            enc.right
        ));
    }
    line
}
