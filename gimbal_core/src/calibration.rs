//! Calibration state, scale measurement and the persisted record.

use std::time::Instant;

use gimbal_traits::{
    CalibrationRecord, PulseLimits, RECORD_MAGIC, SensorOffsets, StoredScales, offsets_valid,
};

use crate::motor::{AxisAssignment, MotorAxis, MotorId};

/// Number of calibration steps; `step == CAL_STEPS` means calibrated.
pub const CAL_STEPS: u8 = 4;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationState {
    pub step: u8,
    pub assignment: AxisAssignment,
    /// A sequence has started and not yet finished or failed.
    pub in_progress: bool,
    /// Reading at the previous settled tick.
    pub last_stable: Option<(f32, f32)>,
    /// Reading at the previous tick, settled or not.
    pub last_fast: Option<(f32, f32)>,
    pub last_update: Option<Instant>,
    /// Earliest time the next tick may act after a calibration excursion.
    pub next_action_at: Option<Instant>,
    /// Consecutive degenerate sequences.
    pub attempts: u8,
    /// Latched after too many degenerate sequences; holds the attempt count.
    pub failed: Option<u8>,
    /// Orientation sensor offsets last saved by the operator; all zero if none.
    pub sensor_offsets: SensorOffsets,
}

impl CalibrationState {
    #[inline]
    pub fn is_calibrated(&self) -> bool {
        self.step >= CAL_STEPS
    }

    #[inline]
    pub fn is_calibrating(&self) -> bool {
        self.in_progress && self.step < CAL_STEPS && self.failed.is_none()
    }
}

/// Pulse units per degree for an excursion, or `None` when the angular
/// change is too small to measure.
pub fn measure_scale(pulse_delta_us: f32, angle_delta_deg: f32, min_motion_deg: f32) -> Option<f32> {
    if !angle_delta_deg.is_finite() || angle_delta_deg.abs() < min_motion_deg || angle_delta_deg == 0.0 {
        return None;
    }
    let s = pulse_delta_us / angle_delta_deg;
    (s.is_finite() && s != 0.0).then_some(s)
}

/// The motor with the smaller azimuth scale magnitude moves azimuth the
/// most per microsecond. Unmeasured scales never win; a tie goes to motor 2.
pub fn select_azimuth_motor(az_scales: [Option<f32>; 2]) -> Option<MotorId> {
    match az_scales {
        [None, None] => None,
        [Some(_), None] => Some(MotorId::One),
        [None, Some(_)] => Some(MotorId::Two),
        [Some(a), Some(b)] => Some(if a.abs() < b.abs() {
            MotorId::One
        } else {
            MotorId::Two
        }),
    }
}

/// Candidate scale from an observed move, kept only if within
/// `max_change` (fractional) of the current one.
pub fn accept_recalibration(current: Option<f32>, candidate: f32, max_change: f32) -> Option<f32> {
    let cur = current?;
    if cur == 0.0 || !candidate.is_finite() {
        return None;
    }
    (((candidate - cur) / cur).abs() < max_change).then_some(candidate)
}

#[inline]
fn trusted(scale: Option<f32>, max_scale: f32) -> bool {
    scale.is_some_and(|s| s.abs() < max_scale)
}

pub fn to_record(motors: &[MotorAxis; 2], state: &CalibrationState) -> CalibrationRecord {
    let scales = |m: &MotorAxis| StoredScales {
        az: m.az_scale.unwrap_or(0.0),
        el: m.el_scale.unwrap_or(0.0),
    };
    CalibrationRecord {
        magic: RECORD_MAGIC,
        limits: [motors[0].limits, motors[1].limits],
        scales: [scales(&motors[0]), scales(&motors[1])],
        az_motor: state.assignment.azimuth.index() as u8,
        step: state.step.min(CAL_STEPS),
        sensor_offsets: state.sensor_offsets,
    }
}

/// What a loaded record contributes to a freshly built controller.
#[derive(Debug, Clone, PartialEq)]
pub struct Restored {
    /// `None` when either motor's stored limits are unusable.
    pub limits: Option<[PulseLimits; 2]>,
    pub scales: [(Option<f32>, Option<f32>); 2],
    pub assignment: AxisAssignment,
    /// `CAL_STEPS` if the record passed the sanity check, else 0.
    pub step: u8,
    /// Saved sensor offsets, when the block is not all zero.
    pub sensor_offsets: Option<SensorOffsets>,
}

impl Restored {
    pub fn is_calibrated(&self) -> bool {
        self.step == CAL_STEPS
    }
}

/// Sanity-check a stored record.
///
/// The record is trusted only if its step is complete, its azimuth motor
/// index names a motor, and both the azimuth motor's azimuth scale and the
/// elevation motor's elevation scale are defined with magnitude below
/// `max_scale`. Otherwise the scales are still returned, untrusted.
pub fn restore(record: &CalibrationRecord, max_scale: f32) -> Restored {
    let defined = |s: f32| (s.is_finite() && s != 0.0).then_some(s);
    let scales = [
        (defined(record.scales[0].az), defined(record.scales[0].el)),
        (defined(record.scales[1].az), defined(record.scales[1].el)),
    ];
    let limits = record
        .limits
        .iter()
        .all(|l| l.min_us < l.max_us)
        .then_some(record.limits);

    let az_motor = MotorId::from_index(record.az_motor);
    let assignment = az_motor.map(AxisAssignment::with_azimuth).unwrap_or_default();
    let valid = record.step == CAL_STEPS
        && az_motor.is_some()
        && trusted(scales[assignment.azimuth.index()].0, max_scale)
        && trusted(scales[assignment.elevation.index()].1, max_scale);

    Restored {
        limits,
        scales,
        assignment,
        step: if valid { CAL_STEPS } else { 0 },
        sensor_offsets: offsets_valid(&record.sensor_offsets).then_some(record.sensor_offsets),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(m1: (f32, f32), m2: (f32, f32), az_motor: u8, step: u8) -> CalibrationRecord {
        let mut r = CalibrationRecord::with_limits([
            PulseLimits {
                min_us: 1000,
                max_us: 2000,
            },
            PulseLimits {
                min_us: 1100,
                max_us: 1900,
            },
        ]);
        r.scales = [
            StoredScales { az: m1.0, el: m1.1 },
            StoredScales { az: m2.0, el: m2.1 },
        ];
        r.az_motor = az_motor;
        r.step = step;
        r
    }

    #[rstest]
    #[case(333.0, 40.0, Some(8.325))]
    #[case(333.0, -30.0, Some(-11.1))]
    #[case(333.0, 0.0, None)]
    #[case(333.0, 0.1, None)]
    #[case(0.0, 40.0, None)]
    fn scale_measurement(#[case] pulse: f32, #[case] angle: f32, #[case] want: Option<f32>) {
        let got = measure_scale(pulse, angle, 0.2);
        match (got, want) {
            (Some(g), Some(w)) => assert!((g - w).abs() < 1e-3, "{g} != {w}"),
            (g, w) => assert_eq!(g, w),
        }
    }

    #[test]
    fn larger_azimuth_effect_wins_selection() {
        // 333 us for 40 deg vs 333 us for 5 deg
        let m1 = measure_scale(333.0, 40.0, 0.2);
        let m2 = measure_scale(333.0, 5.0, 0.2);
        assert_eq!(select_azimuth_motor([m1, m2]), Some(MotorId::One));
        assert_eq!(select_azimuth_motor([m2, m1]), Some(MotorId::Two));
    }

    #[test]
    fn unmeasured_scale_never_selected() {
        assert_eq!(select_azimuth_motor([None, Some(40.0)]), Some(MotorId::Two));
        assert_eq!(select_azimuth_motor([None, None]), None);
    }

    #[rstest]
    #[case(Some(10.0), 10.5, Some(10.5))]
    #[case(Some(10.0), 11.5, None)]
    #[case(Some(-10.0), -9.2, Some(-9.2))]
    #[case(Some(10.0), -10.0, None)]
    #[case(None, 10.0, None)]
    fn recalibration_tolerance(#[case] cur: Option<f32>, #[case] cand: f32, #[case] want: Option<f32>) {
        assert_eq!(accept_recalibration(cur, cand, 0.1), want);
    }

    #[test]
    fn complete_sane_record_is_trusted() {
        let r = restore(&record((8.3, 0.0), (0.0, 16.6), 0, 4), 50.0);
        assert!(r.is_calibrated());
        assert_eq!(r.assignment.azimuth, MotorId::One);
        assert_eq!(r.scales[0], (Some(8.3), None));
    }

    #[rstest]
    #[case::azimuth_scale_too_big(record((51.0, 0.0), (0.0, 16.6), 0, 4))]
    #[case::elevation_scale_too_big(record((8.3, 0.0), (0.0, -60.0), 0, 4))]
    #[case::elevation_scale_missing(record((8.3, 0.0), (0.0, 0.0), 0, 4))]
    #[case::incomplete_step(record((8.3, 0.0), (0.0, 16.6), 0, 3))]
    #[case::bad_motor_index(record((8.3, 0.0), (0.0, 16.6), 2, 4))]
    #[case::nan_scale(record((f32::NAN, 0.0), (0.0, 16.6), 0, 4))]
    fn insane_record_forces_recalibration(#[case] rec: CalibrationRecord) {
        let r = restore(&rec, 50.0);
        assert_eq!(r.step, 0);
    }

    #[test]
    fn only_designated_axes_are_checked() {
        // motor 2 is azimuth; motor 1's huge azimuth scale is irrelevant
        let r = restore(&record((900.0, 12.0), (7.0, 0.0), 1, 4), 50.0);
        assert!(r.is_calibrated());
        assert_eq!(r.assignment.elevation, MotorId::One);
    }

    #[test]
    fn bad_limits_are_dropped_but_scales_kept() {
        let mut rec = record((8.3, 0.0), (0.0, 16.6), 0, 4);
        rec.limits[1] = PulseLimits {
            min_us: 2000,
            max_us: 1000,
        };
        let r = restore(&rec, 50.0);
        assert!(r.limits.is_none());
        assert!(r.is_calibrated());
    }

    #[test]
    fn record_stores_undefined_scale_as_zero() {
        let motors = [
            MotorAxis {
                az_scale: Some(8.0),
                ..MotorAxis::new(0, PulseLimits { min_us: 1000, max_us: 2000 })
            },
            MotorAxis {
                el_scale: Some(-16.0),
                ..MotorAxis::new(1, PulseLimits { min_us: 1000, max_us: 2000 })
            },
        ];
        let state = CalibrationState {
            step: CAL_STEPS,
            ..CalibrationState::default()
        };
        let rec = to_record(&motors, &state);
        assert_eq!(rec.scales[0].el, 0.0);
        assert_eq!(rec.scales[1].az, 0.0);
        assert_eq!(rec.step, 4);
        assert_eq!(restore(&rec, 50.0).scales[1], (None, Some(-16.0)));
    }

    #[test]
    fn only_nonzero_sensor_offsets_are_restored() {
        let mut rec = record((8.3, 0.0), (0.0, 16.6), 0, 4);
        assert_eq!(restore(&rec, 50.0).sensor_offsets, None);
        rec.sensor_offsets[0] = 0x12;
        assert_eq!(restore(&rec, 50.0).sensor_offsets, Some(rec.sensor_offsets));
    }
}
