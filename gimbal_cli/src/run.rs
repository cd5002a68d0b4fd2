//! Backend selection and the command implementations.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::{Result, WrapErr};
use gimbal_config::Config;
use gimbal_core::{Gimbal, GimbalCfg, GimbalError, MotorId, Report, TickStatus};
use gimbal_hardware::FileStore;
use gimbal_traits::{Clock, OrientationSensor};
use tracing::{debug, info, warn};

use crate::cli::DEFAULT_CONFIG;

/// Sim only: start with the pulse controller absent.
const ENV_SIM_ABSENT: &str = "GIMBAL_TEST_SIM_ABSENT";
/// Sim only: fail this many sensor refreshes with a timeout.
const ENV_SIM_FAIL_REFRESHES: &str = "GIMBAL_TEST_SIM_FAIL_REFRESHES";

/// A built controller plus the clock that paces the command loops.
pub struct Rig {
    pub gimbal: Gimbal,
    pub clock: Box<dyn Clock>,
}

/// Load `--config`, else `etc/gimbal.toml` when present, else defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let file = match path {
        Some(p) => Some(p),
        None => Some(Path::new(DEFAULT_CONFIG)).filter(|p| p.exists()),
    };
    let cfg = match file {
        Some(p) => gimbal_config::load_file(p)
            .map_err(|e| Report::new(GimbalError::Config(e.to_string())))
            .wrap_err("loading configuration")?,
        None => Config::default(),
    };
    cfg.validate()
        .map_err(|e| Report::new(GimbalError::Config(e.to_string())))
        .wrap_err("invalid configuration")?;
    Ok(cfg)
}

pub fn build_rig(cfg: &Config, store_path: Option<PathBuf>) -> Result<Rig> {
    let store = FileStore::new(store_path.unwrap_or_else(|| cfg.store.path.clone()));
    debug!(path = %store.path().display(), "calibration store");

    #[cfg(feature = "hardware")]
    {
        hardware_rig(cfg, store)
    }
    #[cfg(not(feature = "hardware"))]
    {
        sim_rig(cfg, store)
    }
}

#[cfg(not(feature = "hardware"))]
fn sim_rig(cfg: &Config, store: FileStore) -> Result<Rig> {
    use gimbal_hardware::{SimGimbal, SimMotor, SimParams};
    use gimbal_traits::ManualClock;

    let l = &cfg.limits;
    let centers = [
        (f32::from(l.motor1_min) + f32::from(l.motor1_max)) / 2.0,
        (f32::from(l.motor2_min) + f32::from(l.motor2_max)) / 2.0,
    ];
    let motors = std::array::from_fn(|i| SimMotor {
        channel: cfg.pwm.channels[i],
        az_deg_per_us: cfg.sim.motors[i].az_deg_per_us,
        el_deg_per_us: cfg.sim.motors[i].el_deg_per_us,
        center_us: centers[i],
    });
    let sim = SimGimbal::new(SimParams {
        center_az: cfg.sim.center_az,
        center_el: cfg.sim.center_el,
        frequency_hz: cfg.pwm.frequency_hz,
        resolution_bits: cfg.pwm.resolution_bits,
        motors,
    });

    if std::env::var(ENV_SIM_ABSENT).is_ok_and(|v| v == "1") {
        warn!("simulated pulse controller marked absent");
        sim.set_present(false);
    }
    if let Some(n) = std::env::var(ENV_SIM_FAIL_REFRESHES)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
    {
        sim.fail_next_refreshes(n);
    }

    // Simulated time: loops finish instantly.
    let clock = ManualClock::new();
    let gimbal = Gimbal::builder()
        .with_config(GimbalCfg::from(cfg))
        .with_sensor(sim.sensor())
        .with_actuator(sim.actuator())
        .with_store(store)
        .with_clock(clock.clone())
        .build()
        .wrap_err("building simulated gimbal")?;
    info!("using simulated gimbal");
    Ok(Rig {
        gimbal,
        clock: Box::new(clock),
    })
}

#[cfg(feature = "hardware")]
fn hardware_rig(cfg: &Config, store: FileStore) -> Result<Rig> {
    use gimbal_hardware::bno055::Bno055;
    use gimbal_core::hw_error::map_hw_error;
    use gimbal_hardware::pca9685::Pca9685;
    use gimbal_traits::MonotonicClock;

    let hw = |e: gimbal_hardware::error::HwError| Report::new(map_hw_error(&e));
    let pwm = Pca9685::new(cfg.pwm.i2c_addr, cfg.pwm.frequency_hz, cfg.pwm.oe_pin)
        .map_err(hw)
        .wrap_err("opening PWM controller (i2c)")?;
    let imu = Bno055::new(
        cfg.sensor.i2c_addr,
        cfg.sensor.mag_declination_deg,
        Duration::from_millis(cfg.sensor.read_timeout_ms),
    )
    .map_err(hw)
    .wrap_err("opening orientation sensor (i2c)")?;

    let gimbal = Gimbal::builder()
        .with_config(GimbalCfg::from(cfg))
        .with_sensor(imu)
        .with_actuator(pwm)
        .with_store(store)
        .with_clock(MonotonicClock::new())
        .build()
        .wrap_err("building gimbal")?;
    info!("using hardware gimbal");
    Ok(Rig {
        gimbal,
        clock: Box::new(MonotonicClock::new()),
    })
}

/// Tick toward the target until both errors are within `tolerance`.
///
/// Calibrates first when no usable calibration was loaded.
pub fn track(
    rig: &mut Rig,
    az: f32,
    el: f32,
    tolerance: f32,
    max_ticks: u32,
    shutdown: &Arc<AtomicBool>,
) -> Result<()> {
    if !(0.0..360.0).contains(&az) || !(0.0..=90.0).contains(&el) {
        return Err(Report::new(GimbalError::Config(format!(
            "target az {az} / el {el} outside [0, 360) x [0, 90]"
        ))));
    }
    if !rig.gimbal.is_calibrated() {
        info!("no usable calibration; calibrating first");
        rig.gimbal.run_calibration().wrap_err("calibrating before tracking")?;
    }

    let period = Duration::from_millis(rig.gimbal.config().control.update_period_ms);
    for tick in 0..max_ticks {
        if shutdown.load(Ordering::Relaxed) {
            warn!(tick, "interrupted");
            return Ok(());
        }
        rig.clock.sleep(period);
        match rig.gimbal.move_to_az_el(az, el)? {
            TickStatus::Tracking { az_error, el_error }
                if az_error.abs() <= tolerance && el_error.abs() <= tolerance =>
            {
                info!(tick, az_error, el_error, "on target");
                println!("on target: az_error={az_error:.2} el_error={el_error:.2}");
                return Ok(());
            }
            TickStatus::Aborted(e) => {
                return Err(Report::new(e)).wrap_err("tracking aborted");
            }
            status => debug!(tick, ?status, "tracking"),
        }
    }
    Err(Report::new(GimbalError::Timeout))
        .wrap_err_with(|| format!("target not reached within {max_ticks} ticks"))
}

pub fn calibrate(rig: &mut Rig) -> Result<()> {
    rig.gimbal.run_calibration()?;
    let a = rig.gimbal.assignment();
    println!("calibrated: azimuth motor {}, elevation motor {}", a.azimuth, a.elevation);
    Ok(())
}

pub fn reset(rig: &mut Rig) -> Result<()> {
    rig.gimbal.reset_calibration();
    rig.gimbal.save_calibration()?;
    println!("calibration reset");
    Ok(())
}

pub fn set(rig: &mut Rig, name: &str, value: &str) -> Result<()> {
    if !rig.gimbal.override_value(name, value)? {
        let known: Vec<&str> = gimbal_core::OverrideKey::names().collect();
        return Err(Report::new(GimbalError::Config(format!(
            "unknown override {name:?}; expected one of {}",
            known.join(", ")
        ))));
    }
    if let Some(msg) = rig.gimbal.user_message() {
        println!("{msg}");
    }
    Ok(())
}

/// `G_*` controller lines followed by `SS_*` sensor lines, or one JSON object.
///
/// A sensor that stopped answering is restarted first.
pub fn status(rig: &mut Rig, json: bool) -> Result<()> {
    // A stale cache is still worth reporting.
    if rig.gimbal.check_sensor() {
        if let Err(e) = rig.gimbal.sensor_mut().refresh() {
            warn!(error = %e, "sensor refresh for status failed");
        }
    }

    let g = &rig.gimbal;
    let s = g.sensor();
    let sc = s.calibration_status();
    let temp = s.temperature_c();
    let connected = s.is_connected();
    let savable = connected && sc.is_full();
    if json {
        let motors: Vec<serde_json::Value> = MotorId::ALL
            .iter()
            .map(|&id| {
                let m = g.motor(id);
                serde_json::json!({
                    "motor": id.to_string(),
                    "pos_us": m.last_pulse,
                    "min_us": m.limits.min_us,
                    "max_us": m.limits.max_us,
                    "az_deg_per_us": gimbal_core::report::degrees_per_us(m.az_scale),
                    "el_deg_per_us": gimbal_core::report::degrees_per_us(m.el_scale),
                })
            })
            .collect();
        let obj = serde_json::json!({
            "status": g.status().to_string(),
            "message": g.user_message(),
            "calibrated": g.is_calibrated(),
            "motors": motors,
            "sensor": {
                "connected": connected,
                "az": s.azimuth(),
                "el": s.elevation(),
                "temp_c": temp,
                "cal": { "sys": sc.sys, "gyro": sc.gyro, "accel": sc.accel, "mag": sc.mag },
                "calibrated": connected && sc.is_usable(),
                "savable": savable,
            },
        });
        println!("{obj}");
        return Ok(());
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    g.emit_status(&mut out).wrap_err("writing status")?;
    if connected {
        writeln!(out, "SS_Az={:.1}", s.azimuth())?;
        writeln!(out, "SS_El={:.1}", s.elevation())?;
        if let Some(t) = temp {
            writeln!(out, "SS_Temp={t}")?;
        }
        let quality = if sc.is_usable() { "Ok+" } else { "Uncalibrated!" };
        writeln!(out, "SS_Status={quality}")?;
        writeln!(out, "SS_SCal={}", sc.sys)?;
        writeln!(out, "SS_GCal={}", sc.gyro)?;
        writeln!(out, "SS_ACal={}", sc.accel)?;
        writeln!(out, "SS_MCal={}", sc.mag)?;
    } else {
        writeln!(out, "SS_Status=Not found!")?;
    }
    // Advisory: every fusion subsystem reports full calibration.
    writeln!(out, "SS_Save={savable}")?;
    Ok(())
}

pub fn self_check(rig: &Rig) -> Result<()> {
    let g = &rig.gimbal;
    let pwm = g.is_connected();
    let sensor = g.sensor().is_connected();
    println!("pulse controller: {}", if pwm { "ok" } else { "missing" });
    println!("orientation sensor: {}", if sensor { "ok" } else { "missing" });
    if sensor {
        let sc = g.sensor().calibration_status();
        let quality = if sc.is_full() {
            "full"
        } else if sc.is_usable() {
            "usable"
        } else {
            "uncalibrated"
        };
        println!("sensor calibration: {quality}");
    }
    println!("calibration: {}", if g.is_calibrated() { "loaded" } else { "none" });
    if pwm && sensor {
        println!("OK");
        Ok(())
    } else {
        Err(Report::new(GimbalError::NotConnected)).wrap_err("self-check failed")
    }
}
