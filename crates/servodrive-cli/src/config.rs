//! Scenario configuration – reads/writes a `servodrive.toml` file.

use serde::{Deserialize, Serialize};
use servodrive_types::{ActuatorParams, PidGains};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use servodrive_hal::{FirstOrderLagModel, LinearVelocityModel, StartupPolicy};

/// File name looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "servodrive.toml";

/// One headless simulation scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub servo: ServoConfig,
    pub drive: DriveConfig,
    pub sim: SimConfig,
}

/// The single pan servo driven by the scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    pub id: String,
    /// Initial measured pose of the joint, radians.
    pub start_rad: f64,
    /// Set-point sent before the first tick, radians.
    pub target_rad: f64,
    pub limits: ActuatorParams,
    pub gains: PidGains,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            id: "pan_joint".to_string(),
            start_rad: 0.0,
            target_rad: 0.8,
            limits: ActuatorParams::default(),
            gains: PidGains::default(),
        }
    }
}

/// Wheel motors of the differential-drive base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Wheel velocity at full power, rad/s.
    pub max_wheel_velocity_rad_s: f64,
    /// Slew rate for the linear model; absent means immediate response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceleration_rad_s2: Option<f64>,
    /// Selects the first-order lag model when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_constant_s: Option<f64>,
    pub left_power: f64,
    pub right_power: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            max_wheel_velocity_rad_s: LinearVelocityModel::DEFAULT_MAX_VELOCITY,
            acceleration_rad_s2: None,
            time_constant_s: None,
            left_power: 0.5,
            right_power: 0.5,
        }
    }
}

/// Which motor model the drive config selects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotorModelChoice {
    Linear(LinearVelocityModel),
    Lag(FirstOrderLagModel),
}

impl DriveConfig {
    /// Resolve the motor model, rejecting non-finite or negative values.
    pub fn model(&self) -> Result<MotorModelChoice, String> {
        check_non_negative("max_wheel_velocity_rad_s", self.max_wheel_velocity_rad_s)?;
        if let Some(tau) = self.time_constant_s {
            check_non_negative("time_constant_s", tau)?;
            return Ok(MotorModelChoice::Lag(FirstOrderLagModel::new(
                self.max_wheel_velocity_rad_s,
                tau,
            )));
        }
        let mut model = LinearVelocityModel::new(self.max_wheel_velocity_rad_s);
        if let Some(accel) = self.acceleration_rad_s2 {
            check_non_negative("acceleration_rad_s2", accel)?;
            model = model.with_acceleration(accel);
        }
        Ok(MotorModelChoice::Linear(model))
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("{name} must be a finite non-negative number, got {value}"))
    }
}

/// Fixed-step timing of the headless run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub step_s: f64,
    pub duration_s: f64,
    pub startup_timeout_ms: u64,
    pub poll_interval_us: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            step_s: 0.01,
            duration_s: 2.0,
            startup_timeout_ms: 5_000,
            poll_interval_us: 250,
        }
    }
}

impl SimConfig {
    /// Number of ticks after the initial one at t = 0.
    pub fn steps(&self) -> Result<u64, String> {
        if !(self.step_s.is_finite() && self.step_s > 0.0) {
            return Err(format!("step_s must be positive, got {}", self.step_s));
        }
        if !(self.duration_s.is_finite() && self.duration_s >= 0.0) {
            return Err(format!("duration_s must be non-negative, got {}", self.duration_s));
        }
        Ok((self.duration_s / self.step_s).round() as u64)
    }

    pub fn startup_policy(&self) -> StartupPolicy {
        StartupPolicy::new(
            Duration::from_millis(self.startup_timeout_ms),
            Duration::from_micros(self.poll_interval_us),
        )
    }
}

/// Return the default config path in the current working directory.
pub fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `SERVODRIVE_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `SERVODRIVE_STEP_S` | `sim.step_s` |
/// | `SERVODRIVE_DURATION_S` | `sim.duration_s` |
/// | `SERVODRIVE_SERVO_TARGET` | `servo.target_rad` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SERVODRIVE_STEP_S")
        && let Ok(step) = v.parse::<f64>()
    {
        cfg.sim.step_s = step;
    }
    if let Ok(v) = std::env::var("SERVODRIVE_DURATION_S")
        && let Ok(duration) = v.parse::<f64>()
    {
        cfg.sim.duration_s = duration;
    }
    if let Ok(v) = std::env::var("SERVODRIVE_SERVO_TARGET")
        && let Ok(target) = v.parse::<f64>()
    {
        cfg.servo.target_rad = target;
    }
}

/// Save the config to `path`, creating parent directories if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
