//! Human-readable error descriptions and structured JSON error formatting.

use gimbal_core::error::{BuildError, GimbalError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSensor => {
                "What happened: No orientation sensor was provided to the controller.\nLikely causes: The sensor driver failed to initialize or was not wired into the builder.\nHow to fix: Ensure the sensor is created successfully and passed via with_sensor(...).".to_string()
            }
            BuildError::MissingActuator => {
                "What happened: No pulse actuator was provided to the controller.\nLikely causes: The PWM driver failed to initialize or was not wired into the builder.\nHow to fix: Ensure the actuator is created successfully and passed via with_actuator(...).".to_string()
            }
            BuildError::MissingStore => {
                "What happened: No calibration store was provided to the controller.\nLikely causes: The builder was not given a store.\nHow to fix: Pass a store via with_store(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/gimbal.toml for a sample."
            ),
        };
    }

    if let Some(ge) = err.downcast_ref::<GimbalError>() {
        return match ge {
            GimbalError::NotConnected => "What happened: Gimbal hardware not found.\nLikely causes: PWM controller or orientation sensor unpowered, wrong I2C address, or loose wiring.\nHow to fix: Check [pwm] i2c_addr and [sensor] i2c_addr, verify power and the I2C bus (i2cdetect), then rerun.".to_string(),
            GimbalError::Timeout => "What happened: Timed out waiting for the gimbal.\nLikely causes: Sensor fusion not running yet, a slow I2C bus, or the gimbal never settled.\nHow to fix: Give the sensor time to boot, raise sensor.read_timeout_ms or calibration.timeout_ms, and check for vibration.".to_string(),
            GimbalError::CalibrationFailed { attempts } => format!(
                "What happened: Calibration failed after {attempts} attempts.\nLikely causes: A motor is disconnected or stalled, or its limits leave too little travel to measure.\nHow to fix: Check both servos move, widen Mot1Min/Mot1Max or Mot2Min/Mot2Max, then run `gimbal reset` and `gimbal calibrate`."
            ),
            GimbalError::DegenerateExcursion { motor, axis } => format!(
                "What happened: Motor {motor} produced no measurable {axis} motion.\nLikely causes: The servo is unpowered or mechanically blocked.\nHow to fix: Check the motor and rerun the calibration."
            ),
            GimbalError::Storage(msg) => format!(
                "What happened: Could not read or write the calibration record ({msg}).\nLikely causes: Missing directory or no write permission.\nHow to fix: Check [store] path (or --store) points to a writable location."
            ),
            GimbalError::Config(msg) => format!(
                "What happened: Invalid configuration or override value ({msg}).\nLikely causes: Out-of-range values in the TOML or a mistyped override.\nHow to fix: Edit the config file or the value, then rerun."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("invalid configuration") || lower.contains("read config") {
        return format!(
            "What happened: Configuration could not be loaded.\nLikely causes: Missing file, TOML syntax error, or a wrongly typed value.\nHow to fix: Fix the config file and try again. Original: {msg}"
        );
    }

    if lower.contains("i2c") || lower.contains("gpio") {
        return "What happened: Failed to open the I2C bus or GPIO.\nLikely causes: I2C disabled on the board or insufficient permissions.\nHow to fix: Enable I2C, and run as a user in the i2c and gpio groups.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable short name of a typed error, for JSON output.
pub fn error_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<GimbalError>() {
        Some(GimbalError::Hardware(_)) => "Hardware",
        Some(GimbalError::HardwareFault(_)) => "HardwareFault",
        Some(GimbalError::Timeout) => "Timeout",
        Some(GimbalError::Storage(_)) => "Storage",
        Some(GimbalError::Config(_)) => "Config",
        Some(GimbalError::DegenerateExcursion { .. }) => "DegenerateExcursion",
        Some(GimbalError::CalibrationFailed { .. }) => "CalibrationFailed",
        Some(GimbalError::NotConnected) => "NotConnected",
        Some(GimbalError::State(_)) => "State",
        None => "Error",
    }
}

/// Map typed errors to stable exit codes; anything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 6;
    }
    match err.downcast_ref::<GimbalError>() {
        Some(GimbalError::NotConnected) => 3,
        Some(GimbalError::CalibrationFailed { .. } | GimbalError::DegenerateExcursion { .. }) => 4,
        Some(GimbalError::Timeout) => 5,
        Some(GimbalError::Config(_)) => 6,
        Some(GimbalError::Storage(_)) => 7,
        Some(GimbalError::Hardware(_) | GimbalError::HardwareFault(_)) => 8,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = error_name(err);
    let msg = humanize(err);
    let details = match err.downcast_ref::<GimbalError>() {
        Some(GimbalError::CalibrationFailed { attempts }) => Some(json!({ "attempts": attempts })),
        Some(GimbalError::DegenerateExcursion { motor, axis }) => {
            Some(json!({ "motor": motor.to_string(), "axis": axis.to_string() }))
        }
        _ => None,
    };

    let obj = if let Some(d) = details {
        json!({ "reason": reason, "details": d, "message": msg })
    } else {
        json!({ "reason": reason, "message": msg })
    };
    obj.to_string()
}
