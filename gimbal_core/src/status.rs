//! Outcome of a control tick and the controller's reported status.

use std::fmt;

use crate::error::GimbalError;
use crate::motor::MotorId;

/// Public status of a single `move_to_az_el` tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickStatus {
    /// Called before the update period elapsed; nothing happened.
    Idle,
    /// A calibration excursion is still settling; the sensor was not read.
    Waiting,
    /// Reading outside the accepted domain; the tick was abandoned.
    BadSample,
    /// Gimbal still moving since the previous tick.
    Moving,
    /// A calibration step ran; `step` is the step that runs next.
    Calibrating { step: u8 },
    /// The final calibration step ran and the record was saved.
    Calibrated,
    /// Seek-target commands were issued for the given pointing error (deg).
    Tracking { az_error: f32, el_error: f32 },
    /// No motor was commanded for the given reason.
    Aborted(GimbalError),
}

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Calibrating { step: u8 },
    Tracking,
    Failed { attempts: u8 },
}

/// Operator-facing summary, most severe condition first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GimbalStatus {
    NotFound,
    Fault,
    CalibrationFailed,
    AtMin(MotorId),
    AtMax(MotorId),
    Uncalibrated,
    Ok,
}

impl fmt::Display for GimbalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GimbalStatus::NotFound => f.write_str("Not found!"),
            GimbalStatus::Fault => f.write_str("Gimbal fault!"),
            GimbalStatus::CalibrationFailed => f.write_str("Calibration failed!"),
            GimbalStatus::AtMin(m) => write!(f, "Servo {m} at Min!"),
            GimbalStatus::AtMax(m) => write!(f, "Servo {m} at Max!"),
            GimbalStatus::Uncalibrated => f.write_str("Uncalibrated!"),
            GimbalStatus::Ok => f.write_str("Ok+"),
        }
    }
}
