use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Sim plant reaches az 120..240 and el 15..75 with these limits
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = format!(
        r#"
[limits]
motor1_min = 1000
motor1_max = 2000
motor2_min = 1000
motor2_max = 2000

[control]
update_period_ms = 500
settle_delay_ms = 500

[calibration]
# simulated time, so this never waits in real time
timeout_ms = 60000

[store]
path = "{}"

[sim]
center_az = 180.0
center_el = 45.0
motors = [[0.12, 0.0], [0.0, 0.06]]
"#,
        dir.path().join("cal.bin").display()
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn gimbal(dir: &tempfile::TempDir) -> Command {
    let cfg = write_valid_config(dir);
    let mut cmd = Command::cargo_bin("gimbal").unwrap();
    cmd.current_dir(dir.path()).arg("--config").arg(&cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["calibrate"], 0, "azimuth motor 1, elevation motor 2", "stdout")]
#[case(&["track", "--az", "200", "--el", "50"], 0, "on target", "stdout")]
#[case(&["track", "--az", "200"], 2, "required", "stderr")]
#[case(&["track", "--az", "400", "--el", "50"], 6, "outside", "stderr")]
#[case(&["track", "--az", "0", "--el", "50", "--max-ticks", "20"], 5, "Timed out", "stderr")]
#[case(&["set", "Mot1Min", "1100"], 0, "Servo 1 minimum saved+", "stdout")]
#[case(&["set", "G_Mot2Max", "1900"], 0, "Servo 2 maximum saved+", "stdout")]
#[case(&["set", "Bogus", "1"], 6, "unknown override", "stderr")]
#[case(&["set", "Mot1Min", "abc"], 6, "Invalid configuration or override value", "stderr")]
#[case(&["set", "SS_Save", "1"], 0, "Sensor calibrations saved+", "stdout")]
#[case(&["self-check"], 0, "OK", "stdout")]
#[case(&["self-check"], 0, "sensor calibration: full", "stdout")]
#[case(&["status"], 0, "G_Status=Uncalibrated!", "stdout")]
#[case(&["status"], 0, "SS_Status=Ok+", "stdout")]
#[case(&["status"], 0, "SS_Save=true", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let mut cmd = gimbal(&dir);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn calibration_persists_across_runs() {
    let dir = tempdir().unwrap();
    gimbal(&dir).arg("calibrate").assert().success();
    assert_eq!(fs::metadata(dir.path().join("cal.bin")).unwrap().len(), 52);

    gimbal(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("G_Status=Ok+"))
        .stdout(predicate::str::contains("G_Mot1Pos="))
        .stdout(predicate::str::contains("SS_Az=180.0"))
        .stdout(predicate::str::contains("SS_MCal=3"));

    // Already calibrated: tracking starts straight away
    gimbal(&dir)
        .args(["--log-level", "info", "track", "--az", "150", "--el", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("on target"))
        .stderr(predicate::str::contains("calibrating first").not());
}

#[test]
fn sensor_offsets_keep_the_motor_calibration() {
    let dir = tempdir().unwrap();
    gimbal(&dir).arg("calibrate").assert().success();
    gimbal(&dir)
        .args(["set", "SS_Save", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sensor calibrations saved+"));
    assert_eq!(fs::metadata(dir.path().join("cal.bin")).unwrap().len(), 52);

    gimbal(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("G_Status=Ok+"))
        .stdout(predicate::str::contains("SS_Status=Ok+"));
}

#[test]
fn reset_forgets_calibration() {
    let dir = tempdir().unwrap();
    gimbal(&dir).arg("calibrate").assert().success();
    gimbal(&dir)
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("calibration reset"));
    gimbal(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("G_Status=Uncalibrated!"));
}

#[rstest]
#[case(&["calibrate"])]
#[case(&["self-check"])]
#[case(&["track", "--az", "200", "--el", "50"])]
fn absent_gimbal_exits_not_connected(#[case] args: &[&str]) {
    let dir = tempdir().unwrap();
    gimbal(&dir)
        .env("GIMBAL_TEST_SIM_ABSENT", "1")
        .args(args)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Gimbal hardware not found"));
}

#[test]
fn absent_gimbal_status_is_not_found() {
    let dir = tempdir().unwrap();
    gimbal(&dir)
        .env("GIMBAL_TEST_SIM_ABSENT", "1")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("G_Status=Not found!"))
        .stdout(predicate::str::contains("G_Mot1Min").not());
}

#[test]
fn sensor_timeout_bubbles_to_cli() {
    let dir = tempdir().unwrap();
    gimbal(&dir)
        .env("GIMBAL_TEST_SIM_FAIL_REFRESHES", "1000")
        .arg("calibrate")
        .assert()
        .code(5)
        .stderr(predicate::str::contains("Timed out waiting for the gimbal"));
}

#[rstest]
#[case("[calibration]\ncal_frac = 1.5\n", "calibration.cal_frac must be in (0.0, 1.0)")]
#[case("[limits]\nmotor1_min = 2500\n", "limits.motor1_min must be < limits.motor1_max")]
#[case("[pwm]\nfrequency_hz = \"fast\"\n", "invalid configuration")]
fn invalid_config_exits_6(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, toml).unwrap();

    Command::cargo_bin("gimbal")
        .unwrap()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&path)
        .arg("self-check")
        .assert()
        .code(6)
        .stderr(predicate::str::contains(needle));
}

#[test]
fn missing_config_names_the_file() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("gimbal")
        .unwrap()
        .current_dir(dir.path())
        .args(["--config", "missing.toml", "status"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("missing.toml"));
}

#[test]
fn store_flag_overrides_config_path() {
    let dir = tempdir().unwrap();
    let other = dir.path().join("elsewhere.bin");
    gimbal(&dir)
        .arg("--store")
        .arg(&other)
        .arg("calibrate")
        .assert()
        .success();
    assert!(other.exists());
    assert!(!dir.path().join("cal.bin").exists());
}
