//! `From` implementations bridging `gimbal_config` types to `gimbal_core` types.

use gimbal_traits::PulseLimits;

use crate::config::{
    CalibrationCfg, ControlCfg, GimbalCfg, HomeCfg, LimitsCfg, PwmCfg, RecalCfg,
};

// ── PwmCfg ───────────────────────────────────────────────────────────────────

impl From<&gimbal_config::PwmCfg> for PwmCfg {
    fn from(c: &gimbal_config::PwmCfg) -> Self {
        Self {
            frequency_hz: c.frequency_hz,
            resolution_bits: c.resolution_bits,
            channels: c.channels,
        }
    }
}

// ── LimitsCfg ────────────────────────────────────────────────────────────────

impl From<&gimbal_config::LimitsCfg> for LimitsCfg {
    fn from(c: &gimbal_config::LimitsCfg) -> Self {
        Self {
            motors: [
                PulseLimits {
                    min_us: c.motor1_min,
                    max_us: c.motor1_max,
                },
                PulseLimits {
                    min_us: c.motor2_min,
                    max_us: c.motor2_max,
                },
            ],
        }
    }
}

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl From<&gimbal_config::ControlCfg> for ControlCfg {
    fn from(c: &gimbal_config::ControlCfg) -> Self {
        Self {
            update_period_ms: c.update_period_ms,
            max_settle_deg: c.max_settle_deg,
            settle_delay_ms: c.settle_delay_ms,
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&gimbal_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &gimbal_config::CalibrationCfg) -> Self {
        Self {
            cal_frac: c.cal_frac,
            max_scale: c.max_scale,
            min_motion_deg: c.min_motion_deg,
            max_attempts: c.max_attempts,
            step_interval_ms: c.step_interval_ms,
            timeout_ms: c.timeout_ms,
        }
    }
}

// ── RecalCfg ─────────────────────────────────────────────────────────────────

impl From<&gimbal_config::RecalibrationCfg> for RecalCfg {
    fn from(c: &gimbal_config::RecalibrationCfg) -> Self {
        Self {
            min_angle_deg: c.min_angle_deg,
            max_change: c.max_change,
        }
    }
}

// ── HomeCfg ──────────────────────────────────────────────────────────────────

impl From<&gimbal_config::HomeCfg> for HomeCfg {
    fn from(c: &gimbal_config::HomeCfg) -> Self {
        Self { az: c.az, el: c.el }
    }
}

// ── GimbalCfg ────────────────────────────────────────────────────────────────

impl From<&gimbal_config::Config> for GimbalCfg {
    fn from(c: &gimbal_config::Config) -> Self {
        Self {
            pwm: (&c.pwm).into(),
            limits: (&c.limits).into(),
            control: (&c.control).into(),
            calibration: (&c.calibration).into(),
            recal: (&c.recalibration).into(),
            home: (&c.home).into(),
        }
    }
}
