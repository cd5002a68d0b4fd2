#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Self-calibrating azimuth/elevation gimbal control (hardware-agnostic).
//!
//! Hardware is reached only through the `gimbal_traits` seams:
//! `OrientationSensor` for the fused az/el reading, `PulseActuator` for the
//! two pulse-width channels and `CalibrationStore` for the persisted record.
//!
//! ## Architecture
//!
//! - **Control loop**: `GimbalController::move_to_az_el`, one rate-limited
//!   tick per call (`controller` module)
//! - **Calibration**: four-step excursion sequence, axis discovery and the
//!   stored record's sanity check (`calibration` module)
//! - **Motors**: clamping and at-limit flags (`motor` module)
//! - **Operator surface**: `G_*` overrides and status lines (`overrides`,
//!   `report` modules)
//! - **Construction**: type-state `GimbalBuilder` or `build_gimbal`
//!   (`builder` module)
//!
//! Angles are degrees (azimuth in [0, 360], elevation in [0, 90]); pulse
//! widths are microseconds until the last step, where they become PWM ticks.

pub mod builder;
pub mod calibration;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod motor;
pub mod overrides;
pub mod report;
pub mod status;
pub mod util;

pub use builder::{Gimbal, GimbalBuilder, Missing, Set, build_gimbal};
pub use calibration::{CAL_STEPS, CalibrationState};
pub use config::{CalibrationCfg, ControlCfg, GimbalCfg, HomeCfg, LimitsCfg, PwmCfg, RecalCfg};
pub use controller::GimbalController;
pub use error::{BuildError, GimbalError, Report, Result};
pub use motor::{AxisAssignment, MotionAxis, MotorAxis, MotorId};
pub use overrides::OverrideKey;
pub use status::{GimbalStatus, Phase, TickStatus};
