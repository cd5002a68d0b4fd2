//! Operator overrides keyed by the flat `G_*` names of the status protocol.

use gimbal_traits::{CalibrationStore, OrientationSensor, PulseActuator, PulseLimits};
use tracing::info;

use crate::controller::GimbalController;
use crate::error::{GimbalError, Report, Result};
use crate::motor::MotorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKey {
    /// Direct pulse width, microseconds.
    Position(MotorId),
    Min(MotorId),
    Max(MotorId),
    /// Full calibration followed by a move toward home.
    Save,
    /// Persist the orientation sensor's own calibration offsets.
    SaveSensor,
}

const OVERRIDES: [(&str, OverrideKey); 8] = [
    ("Mot1Pos", OverrideKey::Position(MotorId::One)),
    ("Mot1Min", OverrideKey::Min(MotorId::One)),
    ("Mot1Max", OverrideKey::Max(MotorId::One)),
    ("Mot2Pos", OverrideKey::Position(MotorId::Two)),
    ("Mot2Min", OverrideKey::Min(MotorId::Two)),
    ("Mot2Max", OverrideKey::Max(MotorId::Two)),
    ("Save", OverrideKey::Save),
    ("SS_Save", OverrideKey::SaveSensor),
];

impl OverrideKey {
    /// Look up a name. Controller keys also accept a `G_` prefix; sensor
    /// keys keep their `SS_` prefix.
    pub fn parse(name: &str) -> Option<Self> {
        let bare = match name.strip_prefix("G_") {
            Some(rest) if !rest.starts_with("SS_") => rest,
            _ => name,
        };
        OVERRIDES
            .iter()
            .find(|(n, _)| *n == bare)
            .map(|(_, key)| *key)
    }

    pub fn name(self) -> &'static str {
        OVERRIDES
            .iter()
            .find(|(_, key)| *key == self)
            .map_or("?", |(n, _)| *n)
    }

    /// All recognized names, without prefix.
    pub fn names() -> impl Iterator<Item = &'static str> {
        OVERRIDES.iter().map(|(n, _)| *n)
    }
}

fn parse_pulse(key: OverrideKey, value: &str) -> Result<u16> {
    value.trim().parse::<u16>().map_err(|_| {
        Report::new(GimbalError::Config(format!(
            "{} expects a pulse width in microseconds, got {value:?}",
            key.name()
        )))
    })
}

impl<S, A, P> GimbalController<S, A, P>
where
    S: OrientationSensor,
    A: PulseActuator,
    P: CalibrationStore,
{
    /// Apply an operator edit. Returns `Ok(false)` if `name` is not an
    /// override this controller handles.
    pub fn override_value(&mut self, name: &str, value: &str) -> Result<bool> {
        let Some(key) = OverrideKey::parse(name) else {
            return Ok(false);
        };
        // Sensor offsets do not need the pulse controller.
        if key != OverrideKey::SaveSensor && !self.actuator.is_present() {
            self.set_message("No gimbal!");
            return Ok(true);
        }

        match key {
            OverrideKey::Position(m) => {
                let us = parse_pulse(key, value)?;
                self.set_motor_position(m, f32::from(us))?;
            }
            OverrideKey::Min(m) => {
                let us = parse_pulse(key, value)?;
                let max_us = self.motors[m.index()].limits.max_us;
                self.edit_limits(m, PulseLimits { min_us: us, max_us })?;
                self.set_message(format!("Servo {m} minimum saved+"));
            }
            OverrideKey::Max(m) => {
                let us = parse_pulse(key, value)?;
                let min_us = self.motors[m.index()].limits.min_us;
                self.edit_limits(m, PulseLimits { min_us, max_us: us })?;
                self.set_message(format!("Servo {m} maximum saved+"));
            }
            OverrideKey::Save => {
                if !self.sensor.is_connected() {
                    self.set_message("no Sensor!");
                    return Ok(true);
                }
                self.run_calibration()?;
            }
            OverrideKey::SaveSensor => self.save_sensor_calibration()?,
        }
        Ok(true)
    }

    fn edit_limits(&mut self, motor: MotorId, limits: PulseLimits) -> Result<()> {
        if limits.min_us >= limits.max_us {
            return Err(Report::new(GimbalError::Config(format!(
                "motor {motor} minimum {} must be below maximum {}",
                limits.min_us, limits.max_us
            ))));
        }
        if let Some(clamped) = self.motors[motor.index()].set_limits(limits) {
            self.set_motor_position(motor, clamped)?;
        }
        info!(motor = %motor, min_us = limits.min_us, max_us = limits.max_us, "motor limits edited");
        self.save_calibration()
    }
}
