//! Per-motor state and the azimuth/elevation role mapping.

use std::fmt;

use gimbal_traits::PulseLimits;

/// One of the two physical motors, numbered as on the wiring harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorId {
    One,
    Two,
}

impl MotorId {
    pub const ALL: [MotorId; 2] = [MotorId::One, MotorId::Two];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            MotorId::One => 0,
            MotorId::Two => 1,
        }
    }

    pub fn from_index(i: u8) -> Option<Self> {
        match i {
            0 => Some(MotorId::One),
            1 => Some(MotorId::Two),
            _ => None,
        }
    }
}

impl fmt::Display for MotorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index() + 1)
    }
}

/// Axis along which a calibration excursion was measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionAxis {
    Azimuth,
    Elevation,
    /// Neither axis moved.
    Any,
}

impl fmt::Display for MotionAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MotionAxis::Azimuth => "azimuth",
            MotionAxis::Elevation => "elevation",
            MotionAxis::Any => "angular",
        })
    }
}

/// Which motor drives which pointing axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisAssignment {
    pub azimuth: MotorId,
    pub elevation: MotorId,
}

impl AxisAssignment {
    pub fn with_azimuth(azimuth: MotorId) -> Self {
        let elevation = match azimuth {
            MotorId::One => MotorId::Two,
            MotorId::Two => MotorId::One,
        };
        Self { azimuth, elevation }
    }
}

impl Default for AxisAssignment {
    fn default() -> Self {
        Self::with_azimuth(MotorId::One)
    }
}

/// Runtime state of one motor.
///
/// Scales are microseconds of pulse width per degree. `None` means the
/// motor has no measured effect on that axis.
#[derive(Debug, Clone, PartialEq)]
pub struct MotorAxis {
    pub channel: u8,
    pub limits: PulseLimits,
    pub az_scale: Option<f32>,
    pub el_scale: Option<f32>,
    pub last_pulse: f32,
    pub last_delta: f32,
    pub at_min: bool,
    pub at_max: bool,
}

impl MotorAxis {
    /// Fresh motor remembered at mid-travel; nothing has been commanded yet.
    pub fn new(channel: u8, limits: PulseLimits) -> Self {
        Self {
            channel,
            limits,
            az_scale: None,
            el_scale: None,
            last_pulse: midpoint(limits),
            last_delta: 0.0,
            at_min: false,
            at_max: false,
        }
    }

    #[inline]
    pub fn range_us(&self) -> f32 {
        f32::from(self.limits.max_us) - f32::from(self.limits.min_us)
    }

    /// Clamp `requested` into the limits and record it as the new position.
    /// Returns the pulse width to send.
    pub fn apply(&mut self, requested: f32) -> f32 {
        let min = f32::from(self.limits.min_us);
        let max = f32::from(self.limits.max_us);
        let mut pos = requested;
        self.at_min = pos <= min;
        if self.at_min {
            pos = min;
        }
        self.at_max = pos >= max;
        if self.at_max {
            pos = max;
        }
        self.last_delta = pos - self.last_pulse;
        self.last_pulse = pos;
        pos
    }

    /// Install new limits.
    ///
    /// Returns the clamped pulse width when the remembered position falls
    /// outside them; the caller must command it. Otherwise the limit flags
    /// are re-evaluated against the new range and `None` is returned.
    pub fn set_limits(&mut self, limits: PulseLimits) -> Option<f32> {
        self.limits = limits;
        let min = f32::from(limits.min_us);
        let max = f32::from(limits.max_us);
        if self.last_pulse < min || self.last_pulse > max {
            return Some(self.last_pulse.clamp(min, max));
        }
        self.at_min = self.last_pulse <= min;
        self.at_max = self.last_pulse >= max;
        None
    }
}

fn midpoint(limits: PulseLimits) -> f32 {
    (f32::from(limits.min_us) + f32::from(limits.max_us)) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motor() -> MotorAxis {
        MotorAxis::new(
            0,
            PulseLimits {
                min_us: 1000,
                max_us: 2000,
            },
        )
    }

    #[test]
    fn above_max_clamps_and_flags_max() {
        let mut m = motor();
        assert_eq!(m.apply(2600.0), 2000.0);
        assert_eq!(m.last_pulse, 2000.0);
        assert!(m.at_max);
        assert!(!m.at_min);
        assert_eq!(m.last_delta, 500.0);
    }

    #[test]
    fn below_min_clamps_and_flags_min() {
        let mut m = motor();
        m.apply(400.0);
        assert_eq!(m.last_pulse, 1000.0);
        assert!(m.at_min);
        assert!(!m.at_max);
    }

    #[test]
    fn exact_limit_counts_as_at_limit() {
        let mut m = motor();
        m.apply(1000.0);
        assert!(m.at_min);
        m.apply(1500.0);
        assert!(!m.at_min && !m.at_max);
        assert_eq!(m.last_delta, 500.0);
    }

    #[test]
    fn narrowing_past_position_returns_pulse_to_command() {
        let mut m = motor();
        m.apply(1900.0);
        let clamped = m.set_limits(PulseLimits {
            min_us: 1000,
            max_us: 1800,
        });
        assert_eq!(clamped, Some(1800.0));
        // Nothing moved yet; applying the clamp records the real change.
        assert_eq!(m.last_pulse, 1900.0);
        m.apply(1800.0);
        assert!(m.at_max);
        assert_eq!(m.last_delta, -100.0);
    }

    #[test]
    fn limit_edit_inside_range_refreshes_flags() {
        let mut m = motor();
        m.apply(2000.0);
        assert!(m.at_max);
        let clamped = m.set_limits(PulseLimits {
            min_us: 1000,
            max_us: 2200,
        });
        assert_eq!(clamped, None);
        assert!(!m.at_max);

        let clamped = m.set_limits(PulseLimits {
            min_us: 1000,
            max_us: 2000,
        });
        assert_eq!(clamped, None);
        assert!(m.at_max);
    }

    #[test]
    fn assignment_names_both_roles() {
        let a = AxisAssignment::with_azimuth(MotorId::Two);
        assert_eq!(a.elevation, MotorId::One);
        assert_eq!(AxisAssignment::default().azimuth, MotorId::One);
    }
}
