#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the gimbal controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section has defaults matching a PCA9685 + BNO055 build, so an
//!   empty file is a valid configuration.
use serde::Deserialize;
use serde::de::Deserializer;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PwmCfg {
    /// I2C bus address of the servo controller
    pub i2c_addr: u16,
    /// Servo pulse repetition frequency
    pub frequency_hz: u32,
    /// Counter resolution of the pulse generator
    pub resolution_bits: u8,
    /// Output channel per motor: [motor 1, motor 2]
    pub channels: [u8; 2],
    /// Optional GPIO wired to the controller's output-enable line (high = disabled)
    pub oe_pin: Option<u8>,
}

impl Default for PwmCfg {
    fn default() -> Self {
        Self {
            i2c_addr: 0x40,
            frequency_hz: 50,
            resolution_bits: 12,
            channels: [0, 1],
            oe_pin: Some(21),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SensorCfg {
    pub i2c_addr: u16,
    /// Added to the magnetic heading before it is reported as azimuth
    pub mag_declination_deg: f32,
    pub read_timeout_ms: u64,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            i2c_addr: 0x28,
            mag_declination_deg: 13.23,
            read_timeout_ms: 100,
        }
    }
}

/// Pulse-width limits used until a persisted record supplies its own.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct LimitsCfg {
    pub motor1_min: u16,
    pub motor1_max: u16,
    pub motor2_min: u16,
    pub motor2_max: u16,
}

impl Default for LimitsCfg {
    fn default() -> Self {
        Self {
            motor1_min: 1000,
            motor1_max: 2000,
            motor2_min: 1000,
            motor2_max: 2000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControlCfg {
    /// Minimum spacing of control ticks that act
    pub update_period_ms: u64,
    /// Consecutive readings closer than this are "settled"
    pub max_settle_deg: f32,
    /// Hold-off after each calibration excursion
    pub settle_delay_ms: u64,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            update_period_ms: 500,
            max_settle_deg: 0.5,
            settle_delay_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Fraction of each motor's travel used for the calibration excursion
    pub cal_frac: f32,
    /// Loaded scales at or above this magnitude are not trusted
    pub max_scale: f32,
    /// Below this, an excursion is treated as having no effect on that axis
    pub min_motion_deg: f32,
    /// Degenerate sequences tolerated before calibration latches failed
    pub max_attempts: u8,
    /// Pacing of the blocking calibration helper
    pub step_interval_ms: u64,
    /// Give up on the blocking calibration helper after this long
    pub timeout_ms: u64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            cal_frac: 0.333,
            max_scale: 50.0,
            min_motion_deg: 0.2,
            max_attempts: 3,
            step_interval_ms: 200,
            timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RecalibrationCfg {
    pub min_angle_deg: f32,
    /// Largest fractional scale change accepted from a single move
    pub max_change: f32,
}

impl Default for RecalibrationCfg {
    fn default() -> Self {
        Self {
            min_angle_deg: 30.0,
            max_change: 0.10,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct HomeCfg {
    pub az: f32,
    pub el: f32,
}

impl Default for HomeCfg {
    fn default() -> Self {
        Self { az: 0.0, el: 45.0 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreCfg {
    pub path: PathBuf,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            path: PathBuf::from("gimbal_calibration.bin"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    #[default]
    Never,
    Daily,
    Hourly,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    pub rotation: Rotation,
}

/// Linear plant model of one simulated motor.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct SimMotorCfg {
    /// Azimuth degrees per microsecond of pulse width
    pub az_deg_per_us: f32,
    /// Elevation degrees per microsecond of pulse width
    pub el_deg_per_us: f32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimCfg {
    /// Orientation with both motors at mid-travel
    pub center_az: f32,
    pub center_el: f32,
    /// Either an array of tables or an array of [az, el] pairs
    #[serde(deserialize_with = "de_sim_motors")]
    pub motors: [SimMotorCfg; 2],
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            center_az: 180.0,
            center_el: 45.0,
            motors: [
                SimMotorCfg {
                    az_deg_per_us: 0.12,
                    el_deg_per_us: 0.0,
                },
                SimMotorCfg {
                    az_deg_per_us: 0.0,
                    el_deg_per_us: 0.06,
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SimMotorToml {
    Pair((f32, f32)),
    Table {
        az_deg_per_us: f32,
        el_deg_per_us: f32,
    },
}

fn de_sim_motors<'de, D>(deserializer: D) -> Result<[SimMotorCfg; 2], D::Error>
where
    D: Deserializer<'de>,
{
    let items: Vec<SimMotorToml> = Vec::deserialize(deserializer)?;
    let mapped: Vec<SimMotorCfg> = items
        .into_iter()
        .map(|m| match m {
            SimMotorToml::Pair((az, el)) => SimMotorCfg {
                az_deg_per_us: az,
                el_deg_per_us: el,
            },
            SimMotorToml::Table {
                az_deg_per_us,
                el_deg_per_us,
            } => SimMotorCfg {
                az_deg_per_us,
                el_deg_per_us,
            },
        })
        .collect();
    <[SimMotorCfg; 2]>::try_from(mapped).map_err(|v| {
        serde::de::Error::custom(format!("sim.motors needs exactly 2 entries, got {}", v.len()))
    })
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub pwm: PwmCfg,
    pub sensor: SensorCfg,
    pub limits: LimitsCfg,
    pub control: ControlCfg,
    pub calibration: CalibrationCfg,
    pub recalibration: RecalibrationCfg,
    pub home: HomeCfg,
    pub store: StoreCfg,
    pub logging: Logging,
    pub sim: SimCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read and parse a config file; validation is left to the caller.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration in {:?}: {}", path, e))
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // PWM
        if self.pwm.frequency_hz == 0 {
            eyre::bail!("pwm.frequency_hz must be > 0");
        }
        if !(8..=16).contains(&self.pwm.resolution_bits) {
            eyre::bail!("pwm.resolution_bits must be in 8..=16");
        }
        if self.pwm.channels[0] == self.pwm.channels[1] {
            eyre::bail!("pwm.channels must name two different outputs");
        }

        // Limits
        if self.limits.motor1_min >= self.limits.motor1_max {
            eyre::bail!("limits.motor1_min must be < limits.motor1_max");
        }
        if self.limits.motor2_min >= self.limits.motor2_max {
            eyre::bail!("limits.motor2_min must be < limits.motor2_max");
        }

        // Control
        if self.control.update_period_ms == 0 {
            eyre::bail!("control.update_period_ms must be >= 1");
        }
        if !(self.control.max_settle_deg > 0.0) {
            eyre::bail!("control.max_settle_deg must be > 0");
        }
        if self.control.settle_delay_ms > 60 * 1000 {
            eyre::bail!("control.settle_delay_ms is unreasonably large (>60s)");
        }

        // Calibration
        if !(self.calibration.cal_frac > 0.0 && self.calibration.cal_frac < 1.0) {
            eyre::bail!("calibration.cal_frac must be in (0.0, 1.0)");
        }
        if !(self.calibration.max_scale > 0.0) {
            eyre::bail!("calibration.max_scale must be > 0");
        }
        if self.calibration.min_motion_deg < 0.0 {
            eyre::bail!("calibration.min_motion_deg must be >= 0");
        }
        if self.calibration.max_attempts == 0 {
            eyre::bail!("calibration.max_attempts must be >= 1");
        }
        if self.calibration.timeout_ms == 0 {
            eyre::bail!("calibration.timeout_ms must be >= 1");
        }

        // Recalibration
        if !(self.recalibration.min_angle_deg > 0.0) {
            eyre::bail!("recalibration.min_angle_deg must be > 0");
        }
        if !(self.recalibration.max_change > 0.0 && self.recalibration.max_change < 1.0) {
            eyre::bail!("recalibration.max_change must be in (0.0, 1.0)");
        }

        // Home
        if !(0.0..360.0).contains(&self.home.az) {
            eyre::bail!("home.az must be in [0, 360)");
        }
        if !(0.0..=90.0).contains(&self.home.el) {
            eyre::bail!("home.el must be in [0, 90]");
        }

        // Sensor
        if self.sensor.read_timeout_ms == 0 {
            eyre::bail!("sensor.read_timeout_ms must be >= 1");
        }
        if !self.sensor.mag_declination_deg.is_finite() {
            eyre::bail!("sensor.mag_declination_deg must be finite");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default_and_valid() {
        let cfg = load_toml("").expect("parse empty");
        cfg.validate().expect("defaults validate");
        assert_eq!(cfg.control.update_period_ms, 500);
        assert_eq!(cfg.pwm.channels, [0, 1]);
        assert!((cfg.calibration.cal_frac - 0.333).abs() < 1e-6);
    }

    #[test]
    fn sim_motors_accept_pairs_and_tables() {
        let cfg = load_toml(
            r#"
[sim]
motors = [[0.5, 0.01], { az_deg_per_us = 0.02, el_deg_per_us = 0.1 }]
"#,
        )
        .expect("parse");
        assert_eq!(cfg.sim.motors[0].az_deg_per_us, 0.5);
        assert_eq!(cfg.sim.motors[1].el_deg_per_us, 0.1);
    }

    #[test]
    fn sim_motors_require_two_entries() {
        let err = load_toml("[sim]\nmotors = [[0.5, 0.0]]\n").unwrap_err();
        assert!(err.to_string().contains("exactly 2"));
    }
}
