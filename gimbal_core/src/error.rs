use thiserror::Error;

use crate::motor::{MotionAxis, MotorId};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GimbalError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("calibration store: {0}")]
    Storage(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("motor {motor} produced no measurable {axis} motion during calibration")]
    DegenerateExcursion { motor: MotorId, axis: MotionAxis },
    #[error("calibration failed after {attempts} attempts")]
    CalibrationFailed { attempts: u8 },
    #[error("device not connected")]
    NotConnected,
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing orientation sensor")]
    MissingSensor,
    #[error("missing pulse actuator")]
    MissingActuator,
    #[error("missing calibration store")]
    MissingStore,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
