//! `key=value` status lines for the status front end.

use std::io::{self, Write};

use gimbal_traits::{CalibrationStore, OrientationSensor, PulseActuator};

use crate::controller::GimbalController;
use crate::motor::MotorId;
use crate::status::GimbalStatus;

/// Degrees per microsecond for display; 0 when the scale is undefined.
#[inline]
pub fn degrees_per_us(scale: Option<f32>) -> f32 {
    scale.filter(|s| *s != 0.0).map_or(0.0, |s| 1.0 / s)
}

impl<S, A, P> GimbalController<S, A, P>
where
    S: OrientationSensor,
    A: PulseActuator,
    P: CalibrationStore,
{
    /// Most severe condition first: absent, fault, failed calibration,
    /// motor limits in motor order, uncalibrated.
    pub fn status(&self) -> GimbalStatus {
        if !self.actuator.is_present() {
            return GimbalStatus::NotFound;
        }
        if self.actuator.fault() {
            return GimbalStatus::Fault;
        }
        if self.cal.failed.is_some() {
            return GimbalStatus::CalibrationFailed;
        }
        for id in MotorId::ALL {
            let m = &self.motors[id.index()];
            if m.at_min {
                return GimbalStatus::AtMin(id);
            }
            if m.at_max {
                return GimbalStatus::AtMax(id);
            }
        }
        if self.cal.is_calibrated() {
            GimbalStatus::Ok
        } else {
            GimbalStatus::Uncalibrated
        }
    }

    /// Write positions, limits, calibration (degrees per microsecond) and
    /// status as `G_*=value` lines.
    pub fn emit_status<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        let status = self.status();
        if status != GimbalStatus::NotFound {
            if self.cal.step > 0 {
                for id in MotorId::ALL {
                    writeln!(out, "G_Mot{id}Pos={:.0}", self.motors[id.index()].last_pulse)?;
                }
            }
            for id in MotorId::ALL {
                let m = &self.motors[id.index()];
                writeln!(out, "G_Mot{id}Min={}", m.limits.min_us)?;
                writeln!(out, "G_Mot{id}Max={}", m.limits.max_us)?;
                writeln!(out, "G_Mot{id}AzCal={:.4}", degrees_per_us(m.az_scale))?;
                writeln!(out, "G_Mot{id}ElCal={:.4}", degrees_per_us(m.el_scale))?;
            }
        }
        writeln!(out, "G_Status={status}")?;
        if let Some(msg) = &self.user_message {
            writeln!(out, "G_Message={msg}")?;
        }
        Ok(())
    }
}
