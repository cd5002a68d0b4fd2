use std::io::Write;

use gimbal_config::{Rotation, load_file, load_toml};
use rstest::rstest;

const FULL: &str = r#"
[pwm]
i2c_addr = 0x41
frequency_hz = 60
resolution_bits = 12
channels = [4, 5]

[sensor]
i2c_addr = 0x29
mag_declination_deg = -2.5
read_timeout_ms = 250

[limits]
motor1_min = 900
motor1_max = 2100
motor2_min = 1100
motor2_max = 1900

[control]
update_period_ms = 250
max_settle_deg = 0.25
settle_delay_ms = 750

[calibration]
cal_frac = 0.25
max_scale = 40.0
max_attempts = 5

[recalibration]
min_angle_deg = 20.0
max_change = 0.05

[home]
az = 90.0
el = 30.0

[store]
path = "/var/lib/gimbal/cal.bin"

[logging]
file = "gimbal.log"
level = "debug"
rotation = "daily"
"#;

#[test]
fn full_file_parses_and_validates() {
    let cfg = load_toml(FULL).expect("parse TOML");
    cfg.validate().expect("valid");

    assert_eq!(cfg.pwm.i2c_addr, 0x41);
    assert_eq!(cfg.pwm.channels, [4, 5]);
    assert_eq!(cfg.pwm.oe_pin, Some(21));
    assert_eq!(cfg.sensor.read_timeout_ms, 250);
    assert_eq!(cfg.limits.motor1_min, 900);
    assert_eq!(cfg.control.settle_delay_ms, 750);
    assert_eq!(cfg.calibration.max_attempts, 5);
    // unspecified fields keep their defaults
    assert_eq!(cfg.calibration.timeout_ms, 60_000);
    assert!((cfg.recalibration.max_change - 0.05).abs() < 1e-6);
    assert_eq!(cfg.home.az, 90.0);
    assert_eq!(cfg.store.path.to_str(), Some("/var/lib/gimbal/cal.bin"));
    assert_eq!(cfg.logging.rotation, Rotation::Daily);
    assert_eq!(cfg.logging.level.as_deref(), Some("debug"));
}

#[rstest]
#[case("[pwm]\nfrequency_hz = 0\n", "pwm.frequency_hz must be > 0")]
#[case("[pwm]\nresolution_bits = 20\n", "pwm.resolution_bits must be in 8..=16")]
#[case("[pwm]\nchannels = [2, 2]\n", "pwm.channels must name two different outputs")]
#[case("[limits]\nmotor1_min = 2000\n", "limits.motor1_min must be < limits.motor1_max")]
#[case("[limits]\nmotor2_max = 900\n", "limits.motor2_min must be < limits.motor2_max")]
#[case("[control]\nupdate_period_ms = 0\n", "control.update_period_ms must be >= 1")]
#[case("[control]\nmax_settle_deg = 0.0\n", "control.max_settle_deg must be > 0")]
#[case("[calibration]\ncal_frac = 1.0\n", "calibration.cal_frac must be in (0.0, 1.0)")]
#[case("[calibration]\nmax_scale = -1.0\n", "calibration.max_scale must be > 0")]
#[case("[calibration]\nmax_attempts = 0\n", "calibration.max_attempts must be >= 1")]
#[case("[recalibration]\nmin_angle_deg = 0.0\n", "recalibration.min_angle_deg must be > 0")]
#[case("[recalibration]\nmax_change = 1.5\n", "recalibration.max_change must be in (0.0, 1.0)")]
#[case("[home]\naz = 360.0\n", "home.az must be in [0, 360)")]
#[case("[home]\nel = 91.0\n", "home.el must be in [0, 90]")]
#[case("[sensor]\nread_timeout_ms = 0\n", "sensor.read_timeout_ms must be >= 1")]
fn rejects_invalid_values(#[case] toml: &str, #[case] message: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(message),
        "expected {message:?}, got {err}"
    );
}

#[test]
fn unknown_rotation_is_a_parse_error() {
    assert!(load_toml("[logging]\nrotation = \"weekly\"\n").is_err());
}

#[test]
fn load_file_reads_from_disk() {
    let mut f = tempfile::NamedTempFile::new().expect("temp file");
    f.write_all(FULL.as_bytes()).expect("write");
    let cfg = load_file(f.path()).expect("load");
    assert_eq!(cfg.home.el, 30.0);
}

#[test]
fn load_file_names_the_path_on_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("missing.toml");
    let err = load_file(&path).expect_err("missing file");
    assert!(format!("{err}").contains("missing.toml"));
}

#[test]
fn shipped_sample_config_is_valid() {
    let cfg = load_toml(include_str!("../../etc/gimbal.toml")).expect("parse sample");
    cfg.validate().expect("sample validates");
    assert_eq!(cfg.sim.motors[1].el_deg_per_us, 0.06);
    assert_eq!(cfg.logging.rotation, Rotation::Never);
}
