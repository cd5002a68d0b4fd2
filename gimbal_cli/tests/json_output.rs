use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn gimbal(dir: &tempfile::TempDir) -> Command {
    let cfg = dir.path().join("cfg.toml");
    fs::write(
        &cfg,
        format!("[store]\npath = \"{}\"\n", dir.path().join("cal.bin").display()),
    )
    .unwrap();
    let mut cmd = Command::cargo_bin("gimbal").unwrap();
    cmd.current_dir(dir.path()).arg("--config").arg(&cfg).arg("--json");
    cmd
}

fn stdout_json(out: &std::process::Output) -> Value {
    let text = String::from_utf8_lossy(&out.stdout);
    let line = text.lines().last().expect("one JSON line on stdout");
    serde_json::from_str(line).expect("stdout is JSON")
}

#[test]
fn status_json_has_expected_shape() {
    let dir = tempdir().unwrap();
    let out = gimbal(&dir).arg("status").output().unwrap();
    assert!(out.status.success());

    let v = stdout_json(&out);
    assert_eq!(v["status"], "Uncalibrated!");
    assert_eq!(v["calibrated"], false);
    assert_eq!(v["motors"].as_array().map(Vec::len), Some(2));
    assert_eq!(v["motors"][0]["min_us"], 1000);
    assert_eq!(v["motors"][1]["max_us"], 2000);
    assert_eq!(v["sensor"]["connected"], true);
    assert_eq!(v["sensor"]["cal"]["sys"], 3);
    assert_eq!(v["sensor"]["calibrated"], true);
    assert_eq!(v["sensor"]["savable"], true);
    assert!(v["sensor"]["az"].is_number());
}

#[test]
fn status_json_after_calibration_reports_rates() {
    let dir = tempdir().unwrap();
    assert!(gimbal(&dir).arg("calibrate").output().unwrap().status.success());

    let out = gimbal(&dir).arg("status").output().unwrap();
    let v = stdout_json(&out);
    assert_eq!(v["status"], "Ok+");
    assert_eq!(v["calibrated"], true);
    let az_rate = v["motors"][0]["az_deg_per_us"].as_f64().unwrap();
    let el_rate = v["motors"][1]["el_deg_per_us"].as_f64().unwrap();
    assert!((az_rate - 0.12).abs() < 0.01, "az rate {az_rate}");
    assert!((el_rate - 0.06).abs() < 0.01, "el rate {el_rate}");
}

#[test]
fn errors_are_structured_in_json_mode() {
    let dir = tempdir().unwrap();
    let out = gimbal(&dir)
        .env("GIMBAL_TEST_SIM_ABSENT", "1")
        .arg("calibrate")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));

    let v = stdout_json(&out);
    assert_eq!(v["reason"], "NotConnected");
    assert!(v["message"].as_str().unwrap().contains("What happened"));
}

#[test]
fn console_logs_are_json_lines_on_stderr() {
    let dir = tempdir().unwrap();
    let out = gimbal(&dir)
        .args(["--log-level", "info", "calibrate"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let stderr = String::from_utf8_lossy(&out.stderr);
    let mut lines = 0;
    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        let v: Value = serde_json::from_str(line).expect("log line is JSON");
        assert!(v.get("level").is_some());
        assert!(v.get("fields").is_some());
        lines += 1;
    }
    assert!(lines > 0, "expected info logs");
}

#[test]
fn file_sink_writes_json_lines() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(
        &cfg,
        format!(
            "[store]\npath = \"{}\"\n\n[logging]\nfile = \"{}\"\nlevel = \"debug\"\n",
            dir.path().join("cal.bin").display(),
            dir.path().join("gimbal.log").display()
        ),
    )
    .unwrap();

    let out = Command::cargo_bin("gimbal")
        .unwrap()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&cfg)
        .arg("calibrate")
        .output()
        .unwrap();
    assert!(out.status.success());

    let log = fs::read_to_string(dir.path().join("gimbal.log")).unwrap();
    assert!(log.lines().count() > 0);
    for line in log.lines() {
        let _: Value = serde_json::from_str(line).expect("file log line is JSON");
    }
    assert!(log.contains("calibration record saved"));
}
