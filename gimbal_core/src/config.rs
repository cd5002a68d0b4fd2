//! Configuration types for the gimbal controller.
//!
//! These are the runtime configuration structs used by `GimbalController`.
//! They are separate from the TOML-deserialized config in `gimbal_config`.

use gimbal_traits::PulseLimits;

/// PWM output geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct PwmCfg {
    pub frequency_hz: u32,
    pub resolution_bits: u8,
    /// Output channel for [motor 1, motor 2].
    pub channels: [u8; 2],
}

impl Default for PwmCfg {
    fn default() -> Self {
        Self {
            frequency_hz: 50,
            resolution_bits: 12,
            channels: [0, 1],
        }
    }
}

/// Pulse limits used when no persisted record supplies them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitsCfg {
    pub motors: [PulseLimits; 2],
}

impl Default for LimitsCfg {
    fn default() -> Self {
        let l = PulseLimits {
            min_us: 1000,
            max_us: 2000,
        };
        Self { motors: [l, l] }
    }
}

/// Control loop timing and settle detection.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlCfg {
    /// Minimum spacing between ticks that act (ms).
    pub update_period_ms: u64,
    /// Consecutive readings closer than this on both axes are "settled" (deg).
    pub max_settle_deg: f32,
    /// Hold-off after each calibration excursion before the next tick acts (ms).
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

/// Scale discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCfg {
    /// Fraction of each motor's range used for its excursion.
    pub cal_frac: f32,
    /// Loaded scales with magnitude at or above this are not trusted.
    pub max_scale: f32,
    /// Angular change below this counts as no motion (deg).
    pub min_motion_deg: f32,
    /// Degenerate sequences before calibration latches failed.
    pub max_attempts: u8,
    /// Pacing of `run_calibration` (ms).
    pub step_interval_ms: u64,
    /// `run_calibration` gives up after this long (ms).
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

/// Online scale correction while tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct RecalCfg {
    /// Only moves at least this large are used (deg).
    pub min_angle_deg: f32,
    /// Largest accepted fractional change of a scale.
    pub max_change: f32,
}

impl Default for RecalCfg {
    fn default() -> Self {
        Self {
            min_angle_deg: 30.0,
            max_change: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomeCfg {
    pub az: f32,
    pub el: f32,
}

impl Default for HomeCfg {
    fn default() -> Self {
        Self { az: 0.0, el: 45.0 }
    }
}

/// Everything the controller needs besides its collaborators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GimbalCfg {
    pub pwm: PwmCfg,
    pub limits: LimitsCfg,
    pub control: ControlCfg,
    pub calibration: CalibrationCfg,
    pub recal: RecalCfg,
    pub home: HomeCfg,
}
