use gimbal_core::calibration::{accept_recalibration, select_azimuth_motor};
use gimbal_core::util::az_dist;
use gimbal_core::{MotorAxis, MotorId};
use gimbal_traits::PulseLimits;
use gimbal_traits::pulse::{pulse_us_to_ticks, ticks_to_pulse_us};
use proptest::prelude::*;

proptest! {
    #[test]
    fn az_dist_is_the_short_signed_path(from in 0.0f32..=360.0, to in 0.0f32..=360.0) {
        let d = az_dist(from, to);
        prop_assert!(d > -180.0 && d <= 180.0, "az_dist({from}, {to}) = {d}");
        // stepping by d from `from` lands on `to`, modulo a full turn
        let landed = (from + d).rem_euclid(360.0);
        let err = (landed - to.rem_euclid(360.0)).abs();
        prop_assert!(err < 1e-3 || (360.0 - err) < 1e-3, "landed {landed}, to {to}");
    }

    #[test]
    fn commands_never_leave_the_limits(
        min in 500u16..1500,
        span in 1u16..1500,
        requests in proptest::collection::vec(-5000.0f32..5000.0, 1..32),
    ) {
        let limits = PulseLimits { min_us: min, max_us: min + span };
        let mut m = MotorAxis::new(0, limits);
        for r in requests {
            let before = m.last_pulse;
            let sent = m.apply(r);
            prop_assert!(sent >= f32::from(limits.min_us) && sent <= f32::from(limits.max_us));
            prop_assert_eq!(m.last_pulse, sent);
            prop_assert_eq!(m.last_delta, sent - before);
            prop_assert_eq!(m.at_min, r <= f32::from(limits.min_us));
            prop_assert_eq!(m.at_max, r >= f32::from(limits.max_us));
        }
    }

    #[test]
    fn tick_conversion_is_within_half_a_tick(pulse in 500.0f32..2500.0) {
        let ticks = pulse_us_to_ticks(pulse, 50, 12);
        let back = ticks_to_pulse_us(ticks, 50, 12);
        // 20 ms / 4096
        prop_assert!((back - pulse).abs() <= 4.8828125 / 2.0 + 1e-3);
    }

    #[test]
    fn selection_prefers_the_smaller_magnitude(a in -60.0f32..60.0, b in -60.0f32..60.0) {
        prop_assume!(a != 0.0 && b != 0.0);
        let picked = select_azimuth_motor([Some(a), Some(b)]).expect("both measured");
        let want = if a.abs() < b.abs() { MotorId::One } else { MotorId::Two };
        prop_assert_eq!(picked, want);
    }

    #[test]
    fn accepted_scale_is_within_tolerance(cur in 1.0f32..40.0, ratio in 0.5f32..1.5) {
        let candidate = cur * ratio;
        match accept_recalibration(Some(cur), candidate, 0.1) {
            Some(s) => prop_assert!(((s - cur) / cur).abs() < 0.1),
            None => prop_assert!(((candidate - cur) / cur).abs() >= 0.1),
        }
    }
}
