//! Azimuth and pulse math shared by the control loop.

/// Shortest signed azimuth path from `from` to `to`, degrees.
///
/// For inputs in [0, 360] the result is in (-180, 180].
#[inline]
pub fn az_dist(from: f32, to: f32) -> f32 {
    let d = to - from;
    if d <= -180.0 {
        d + 360.0
    } else if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

/// Whether a sensor reading lies in the domain the controller accepts.
#[inline]
pub fn in_domain(az: f32, el: f32) -> bool {
    (0.0..=360.0).contains(&az) && (0.0..=90.0).contains(&el)
}

/// Pulse width at `frac` of the way from `min_us` to `max_us`.
#[inline]
pub fn pulse_at_fraction(min_us: u16, max_us: u16, frac: f32) -> f32 {
    let min = f32::from(min_us);
    min + frac * (f32::from(max_us) - min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(350.0, 10.0, 20.0)]
    #[case(10.0, 350.0, -20.0)]
    #[case(0.0, 180.0, 180.0)]
    #[case(180.0, 0.0, 180.0)]
    #[case(90.0, 45.0, -45.0)]
    fn az_dist_examples(#[case] from: f32, #[case] to: f32, #[case] want: f32) {
        assert_eq!(az_dist(from, to), want);
    }

    #[test]
    fn domain_rejects_nan_and_out_of_range() {
        assert!(in_domain(0.0, 0.0));
        assert!(in_domain(360.0, 90.0));
        assert!(!in_domain(-0.1, 10.0));
        assert!(!in_domain(10.0, 90.5));
        assert!(!in_domain(f32::NAN, 10.0));
    }

    #[test]
    fn fraction_of_range() {
        assert_eq!(pulse_at_fraction(1000, 2000, 0.1), 1100.0);
        assert_eq!(pulse_at_fraction(1000, 2000, 0.9), 1900.0);
    }
}
