//! The gimbal control loop (`GimbalController`).
//!
//! Each acting tick reads the orientation sensor, decides whether the
//! gimbal has settled, and then either advances the calibration sequence
//! or runs the seek-target law. At most one pulse command is issued per
//! motor per tick.

use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::WrapErr;
use gimbal_traits::pulse::pulse_us_to_ticks;
use gimbal_traits::{CalibrationStore, Clock, OrientationSensor, PulseActuator, offsets_valid};
use tracing::{debug, error, info, trace, warn};

use crate::calibration::{
    self, CAL_STEPS, CalibrationState, accept_recalibration, measure_scale, select_azimuth_motor,
};
use crate::config::GimbalCfg;
use crate::error::{GimbalError, Report, Result};
use crate::hw_error::map_hw_error;
use crate::motor::{AxisAssignment, MotionAxis, MotorAxis, MotorId};
use crate::status::{Phase, TickStatus};
use crate::util::{az_dist, in_domain, pulse_at_fraction};

/// Pause between the last calibration tick and the move toward home.
const HOME_SETTLE: Duration = Duration::from_millis(1000);

/// Excursions smaller than this many microseconds cannot be measured.
const MIN_EXCURSION_US: f32 = 1.0;

pub struct GimbalController<S, A, P>
where
    S: OrientationSensor,
    A: PulseActuator,
    P: CalibrationStore,
{
    pub(crate) sensor: S,
    pub(crate) actuator: A,
    pub(crate) store: P,
    pub(crate) cfg: GimbalCfg,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) motors: [MotorAxis; 2],
    pub(crate) cal: CalibrationState,
    pub(crate) user_message: Option<String>,
}

impl<S, A, P> core::fmt::Debug for GimbalController<S, A, P>
where
    S: OrientationSensor,
    A: PulseActuator,
    P: CalibrationStore,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GimbalController")
            .field("phase", &self.phase())
            .field("motors", &self.motors)
            .field("assignment", &self.cal.assignment)
            .finish_non_exhaustive()
    }
}

impl<S, A, P> GimbalController<S, A, P>
where
    S: OrientationSensor,
    A: PulseActuator,
    P: CalibrationStore,
{
    /// Assemble a controller and install the stored calibration, if any.
    /// Configuration must already be validated.
    pub(crate) fn assemble(
        sensor: S,
        actuator: A,
        mut store: P,
        cfg: GimbalCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self> {
        let mut motors = [
            MotorAxis::new(cfg.pwm.channels[0], cfg.limits.motors[0]),
            MotorAxis::new(cfg.pwm.channels[1], cfg.limits.motors[1]),
        ];
        let mut cal = CalibrationState::default();

        let record = store
            .load()
            .map_err(|e| Report::new(GimbalError::Storage(e.to_string())))
            .wrap_err("loading calibration record")?;

        match record {
            Some(rec) => {
                let restored = calibration::restore(&rec, cfg.calibration.max_scale);
                if let Some(limits) = restored.limits {
                    // Nothing has been commanded yet; start mid-travel.
                    for (m, l) in motors.iter_mut().zip(limits) {
                        *m = MotorAxis::new(m.channel, l);
                    }
                } else {
                    warn!("stored motor limits unusable; using configured limits");
                }
                for (m, (az, el)) in motors.iter_mut().zip(restored.scales) {
                    m.az_scale = az;
                    m.el_scale = el;
                }
                cal.assignment = restored.assignment;
                cal.step = restored.step;
                if let Some(offsets) = restored.sensor_offsets {
                    cal.sensor_offsets = offsets;
                } else {
                    debug!("no stored sensor offsets");
                }
                if restored.is_calibrated() {
                    info!(az_motor = %cal.assignment.azimuth, "installed stored calibration");
                } else {
                    warn!(
                        stored_step = rec.step,
                        "stored calibration failed sanity check; recalibration required"
                    );
                }
            }
            None => info!("no stored calibration; recalibration required"),
        }

        let mut gimbal = Self {
            sensor,
            actuator,
            store,
            cfg,
            clock,
            motors,
            cal,
            user_message: None,
        };
        gimbal.install_sensor_offsets();
        Ok(gimbal)
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Whether the pulse controller hardware is present.
    pub fn is_connected(&self) -> bool {
        self.actuator.is_present()
    }

    pub fn is_calibrated(&self) -> bool {
        self.cal.is_calibrated()
    }

    pub fn is_calibrating(&self) -> bool {
        self.cal.is_calibrating()
    }

    pub fn phase(&self) -> Phase {
        if let Some(attempts) = self.cal.failed {
            Phase::Failed { attempts }
        } else if self.cal.is_calibrated() {
            Phase::Tracking
        } else if self.cal.in_progress {
            Phase::Calibrating { step: self.cal.step }
        } else {
            Phase::Uninitialized
        }
    }

    pub fn motor(&self, id: MotorId) -> &MotorAxis {
        &self.motors[id.index()]
    }

    pub fn assignment(&self) -> AxisAssignment {
        self.cal.assignment
    }

    pub fn calibration_state(&self) -> &CalibrationState {
        &self.cal
    }

    pub fn config(&self) -> &GimbalCfg {
        &self.cfg
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    /// For reporting-only reads between ticks.
    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Last operator-facing message, if any.
    pub fn user_message(&self) -> Option<&str> {
        self.user_message.as_deref()
    }

    pub(crate) fn set_message(&mut self, msg: impl Into<String>) {
        self.user_message = Some(msg.into());
    }

    // ── Control loop ─────────────────────────────────────────────────────────

    /// One control tick toward `target_az`/`target_el` (degrees).
    ///
    /// Rate-limited to one acting tick per update period. `Err` is returned
    /// only for collaborator I/O failures; every control outcome is a
    /// `TickStatus`.
    pub fn move_to_az_el(&mut self, target_az: f32, target_el: f32) -> Result<TickStatus> {
        if let Some(attempts) = self.cal.failed {
            return Ok(TickStatus::Aborted(GimbalError::CalibrationFailed { attempts }));
        }

        let now = self.clock.now();
        let period = Duration::from_millis(self.cfg.control.update_period_ms);
        if self
            .cal
            .last_update
            .is_some_and(|last| now.saturating_duration_since(last) < period)
        {
            return Ok(TickStatus::Idle);
        }
        if self.cal.next_action_at.is_some_and(|t| now < t) {
            return Ok(TickStatus::Waiting);
        }
        if !self.actuator.is_present() {
            return Ok(TickStatus::Aborted(GimbalError::NotConnected));
        }

        self.cal.last_update = Some(now);
        self.cal.next_action_at = None;

        self.sensor
            .refresh()
            .map_err(|e| Report::new(map_hw_error(&*e)))
            .wrap_err("refreshing orientation sensor")?;
        let az = self.sensor.azimuth();
        let el = self.sensor.elevation();
        if !in_domain(az, el) {
            warn!(az, el, "discarding out-of-domain orientation reading");
            return Ok(TickStatus::BadSample);
        }

        let settle = self.cfg.control.max_settle_deg;
        let settled = self
            .cal
            .last_fast
            .is_some_and(|(faz, fel)| az_dist(faz, az).abs() < settle && (el - fel).abs() < settle);
        trace!(az, el, settled, target_az, target_el, "tick");

        if !settled {
            self.cal.last_fast = Some((az, el));
            return Ok(TickStatus::Moving);
        }
        let outcome = if self.cal.is_calibrated() {
            self.seek_target(target_az, target_el, az, el)
        } else {
            self.calibrate(az, el, now)
        };
        // The reading was taken whether or not a command failed.
        self.cal.last_fast = Some((az, el));
        let status = outcome?;
        self.cal.last_stable = Some((az, el));
        Ok(status)
    }

    /// Clamp and send a pulse width to one motor.
    ///
    /// A no-op when the pulse controller is absent.
    pub fn set_motor_position(&mut self, motor: MotorId, pulse_us: f32) -> Result<()> {
        if !self.actuator.is_present() {
            return Ok(());
        }
        if !pulse_us.is_finite() {
            return Err(Report::new(GimbalError::State(format!(
                "non-finite pulse width for motor {motor}"
            ))));
        }

        let m = &mut self.motors[motor.index()];
        let pos = m.apply(pulse_us);
        let (channel, at_min, at_max) = (m.channel, m.at_min, m.at_max);
        let ticks = pulse_us_to_ticks(
            pos,
            self.cfg.pwm.frequency_hz,
            self.cfg.pwm.resolution_bits,
        );
        debug!(motor = %motor, pulse_us = pos, ticks, at_min, at_max, "motor command");

        self.actuator
            .write_ticks(channel, ticks)
            .map_err(|e| Report::new(map_hw_error(&*e)))
            .wrap_err_with(|| format!("commanding motor {motor}"))?;
        Ok(())
    }

    fn calibrate(&mut self, az: f32, el: f32, now: Instant) -> Result<TickStatus> {
        self.cal.in_progress = true;
        self.set_message("Calibrating gimbal");
        let frac = self.cfg.calibration.cal_frac;

        match self.cal.step {
            0 => {
                for id in MotorId::ALL {
                    let l = self.motors[id.index()].limits;
                    let start = pulse_at_fraction(l.min_us, l.max_us, (1.0 - frac) / 2.0);
                    self.set_motor_position(id, start)?;
                }
                info!(step = 0, "calibration: motors placed for excursions");
            }
            1 => {
                self.excursion(MotorId::One)?;
            }
            2 => {
                if let Err(e) = self.measure(MotorId::One, az, el) {
                    return Ok(self.degenerate(e));
                }
                self.excursion(MotorId::Two)?;
            }
            3 => {
                if let Err(e) = self.measure(MotorId::Two, az, el) {
                    return Ok(self.degenerate(e));
                }
                return self.finish_calibration();
            }
            other => {
                return Ok(TickStatus::Aborted(GimbalError::State(format!(
                    "calibration step {other} out of range"
                ))));
            }
        }

        self.cal.step += 1;
        self.cal.next_action_at =
            Some(now + Duration::from_millis(self.cfg.control.settle_delay_ms));
        Ok(TickStatus::Calibrating {
            step: self.cal.step,
        })
    }

    fn excursion(&mut self, id: MotorId) -> Result<()> {
        let m = &self.motors[id.index()];
        let target = m.last_pulse + self.cfg.calibration.cal_frac * m.range_us();
        info!(step = self.cal.step, motor = %id, from_us = m.last_pulse, to_us = target, "calibration: excursion");
        self.set_motor_position(id, target)
    }

    /// Derive a motor's scales from its last excursion and the motion seen
    /// since the previous settled reading.
    fn measure(&mut self, id: MotorId, az: f32, el: f32) -> std::result::Result<(), GimbalError> {
        let (stable_az, stable_el) = self
            .cal
            .last_stable
            .ok_or_else(|| GimbalError::State("no settled reference reading".into()))?;
        let min_motion = self.cfg.calibration.min_motion_deg;
        let m = &mut self.motors[id.index()];
        let pulse = m.last_delta;
        if pulse.abs() < MIN_EXCURSION_US {
            return Err(GimbalError::DegenerateExcursion {
                motor: id,
                axis: MotionAxis::Any,
            });
        }

        let az_move = az_dist(stable_az, az);
        let el_move = el - stable_el;
        m.az_scale = measure_scale(pulse, az_move, min_motion);
        m.el_scale = measure_scale(pulse, el_move, min_motion);
        info!(
            motor = %id,
            pulse_us = pulse,
            az_move,
            el_move,
            az_scale = ?m.az_scale,
            el_scale = ?m.el_scale,
            "calibration: measured scales"
        );
        if m.az_scale.is_none() && m.el_scale.is_none() {
            return Err(GimbalError::DegenerateExcursion {
                motor: id,
                axis: MotionAxis::Any,
            });
        }
        Ok(())
    }

    fn finish_calibration(&mut self) -> Result<TickStatus> {
        let az_scales = [self.motors[0].az_scale, self.motors[1].az_scale];
        let Some(az_motor) = select_azimuth_motor(az_scales) else {
            return Ok(self.degenerate(GimbalError::DegenerateExcursion {
                motor: MotorId::One,
                axis: MotionAxis::Azimuth,
            }));
        };
        let assignment = AxisAssignment::with_azimuth(az_motor);
        if self.motors[assignment.elevation.index()].el_scale.is_none() {
            return Ok(self.degenerate(GimbalError::DegenerateExcursion {
                motor: assignment.elevation,
                axis: MotionAxis::Elevation,
            }));
        }

        self.cal.assignment = assignment;
        self.cal.step = CAL_STEPS;
        self.cal.in_progress = false;
        self.cal.attempts = 0;
        self.cal.next_action_at = None;
        info!(
            az_motor = %assignment.azimuth,
            az_scale = ?self.motors[assignment.azimuth.index()].az_scale,
            el_motor = %assignment.elevation,
            el_scale = ?self.motors[assignment.elevation.index()].el_scale,
            "calibration complete"
        );
        self.save_calibration()?;
        self.set_message("Gimbal calibrated+");
        Ok(TickStatus::Calibrated)
    }

    /// Restart the sequence, or latch failure once attempts run out.
    fn degenerate(&mut self, err: GimbalError) -> TickStatus {
        self.cal.attempts = self.cal.attempts.saturating_add(1);
        self.cal.step = 0;
        self.cal.next_action_at = None;
        let attempts = self.cal.attempts;
        if attempts >= self.cfg.calibration.max_attempts {
            self.cal.failed = Some(attempts);
            self.cal.in_progress = false;
            error!(attempts, error = %err, "calibration failed; reset required");
            self.set_message("Calibration failed!");
            TickStatus::Aborted(GimbalError::CalibrationFailed { attempts })
        } else {
            warn!(attempts, error = %err, "degenerate calibration excursion; restarting");
            TickStatus::Aborted(err)
        }
    }

    fn seek_target(&mut self, target_az: f32, target_el: f32, az: f32, el: f32) -> Result<TickStatus> {
        let az_error = az_dist(az, target_az);
        let el_error = target_el - el;

        self.recalibrate(az, el);

        let AxisAssignment {
            azimuth,
            elevation,
        } = self.cal.assignment;
        let azm = &self.motors[azimuth.index()];
        let elm = &self.motors[elevation.index()];
        let (Some(az_scale), Some(el_scale)) = (azm.az_scale, elm.el_scale) else {
            return Ok(TickStatus::Aborted(GimbalError::State(
                "tracking without azimuth and elevation scales".into(),
            )));
        };

        let l = azm.limits;
        let az_pulse = if azm.at_min {
            pulse_at_fraction(l.min_us, l.max_us, 0.9)
        } else if azm.at_max {
            pulse_at_fraction(l.min_us, l.max_us, 0.1)
        } else {
            azm.last_pulse + az_error * az_scale
        };
        // Elevation has no limit swing-back.
        let el_pulse = elm.last_pulse + el_error * el_scale;
        debug!(az, el, target_az, target_el, az_error, el_error, az_pulse, el_pulse, "seek target");

        self.set_motor_position(azimuth, az_pulse)?;
        self.set_motor_position(elevation, el_pulse)?;
        Ok(TickStatus::Tracking { az_error, el_error })
    }

    /// Adjust each tracking scale from a large observed move, within tolerance.
    fn recalibrate(&mut self, az: f32, el: f32) {
        let Some((stable_az, stable_el)) = self.cal.last_stable else {
            return;
        };
        let min_angle = self.cfg.recal.min_angle_deg;
        let max_change = self.cfg.recal.max_change;
        let AxisAssignment {
            azimuth,
            elevation,
        } = self.cal.assignment;

        let az_move = az_dist(stable_az, az);
        if az_move.abs() >= min_angle {
            let m = &mut self.motors[azimuth.index()];
            let candidate = m.last_delta / az_move;
            match accept_recalibration(m.az_scale, candidate, max_change) {
                Some(s) => {
                    info!(motor = %azimuth, old = ?m.az_scale, new = s, "azimuth scale adjusted");
                    m.az_scale = Some(s);
                }
                None => {
                    warn!(motor = %azimuth, current = ?m.az_scale, candidate, "azimuth scale candidate discarded");
                }
            }
        }

        let el_move = el - stable_el;
        if el_move.abs() >= min_angle {
            let m = &mut self.motors[elevation.index()];
            let candidate = m.last_delta / el_move;
            match accept_recalibration(m.el_scale, candidate, max_change) {
                Some(s) => {
                    info!(motor = %elevation, old = ?m.el_scale, new = s, "elevation scale adjusted");
                    m.el_scale = Some(s);
                }
                None => {
                    warn!(motor = %elevation, current = ?m.el_scale, candidate, "elevation scale candidate discarded");
                }
            }
        }
    }

    // ── Calibration lifecycle ────────────────────────────────────────────────

    /// Forget the calibration; the next settled tick starts over at step 0.
    pub fn reset_calibration(&mut self) {
        self.cal.step = 0;
        self.cal.in_progress = false;
        self.cal.attempts = 0;
        self.cal.failed = None;
        self.cal.next_action_at = None;
        info!("calibration reset");
    }

    /// Write limits, scales, assignment and step to the store.
    pub fn save_calibration(&mut self) -> Result<()> {
        let record = calibration::to_record(&self.motors, &self.cal);
        self.store
            .save(&record)
            .map_err(|e| Report::new(GimbalError::Storage(e.to_string())))
            .wrap_err("saving calibration record")?;
        info!(step = record.step, az_motor = record.az_motor, "calibration record saved");
        Ok(())
    }

    // ── Orientation sensor upkeep ────────────────────────────────────────────

    /// Push the saved sensor offsets, if any, to a connected sensor.
    fn install_sensor_offsets(&mut self) {
        if !offsets_valid(&self.cal.sensor_offsets) || !self.sensor.is_connected() {
            return;
        }
        match self.sensor.write_offsets(&self.cal.sensor_offsets) {
            Ok(()) => info!("installed stored sensor offsets"),
            Err(e) => warn!(error = %e, "could not install stored sensor offsets"),
        }
    }

    /// Restart a sensor that stopped answering and reinstall its offsets.
    /// Returns whether the sensor is connected afterwards.
    pub fn check_sensor(&mut self) -> bool {
        if self.sensor.is_connected() {
            return true;
        }
        match self.sensor.reconnect() {
            Ok(true) => {
                warn!("orientation sensor restarted");
                self.set_message("Sensor error... restarting sensor!");
                self.install_sensor_offsets();
                true
            }
            Ok(false) => {
                debug!("orientation sensor still missing");
                false
            }
            Err(e) => {
                warn!(error = %e, "orientation sensor restart failed");
                false
            }
        }
    }

    /// Read the sensor's own calibration offsets and persist them with the
    /// calibration record.
    pub fn save_sensor_calibration(&mut self) -> Result<()> {
        if !self.sensor.is_connected() {
            self.set_message("no Sensor!");
            return Ok(());
        }
        let offsets = self
            .sensor
            .read_offsets()
            .map_err(|e| Report::new(map_hw_error(&*e)))
            .wrap_err("reading sensor offsets")?;
        let Some(offsets) = offsets.filter(offsets_valid) else {
            self.set_message("Sensor calibration not valid");
            return Err(Report::new(GimbalError::State(
                "sensor reported no calibration offsets".into(),
            )));
        };
        self.cal.sensor_offsets = offsets;
        self.save_calibration()?;
        info!("sensor offsets saved");
        self.set_message("Sensor calibrations saved+");
        Ok(())
    }

    /// Run a complete calibration, then take one step toward home.
    ///
    /// Drives ticks through the injected clock, sleeping
    /// `step_interval_ms` between them, and gives up after `timeout_ms`.
    pub fn run_calibration(&mut self) -> Result<()> {
        if !self.actuator.is_present() {
            self.set_message("No gimbal!");
            return Err(Report::new(GimbalError::NotConnected)).wrap_err("pulse controller not found");
        }
        if !self.sensor.is_connected() {
            self.set_message("no Sensor!");
            return Err(Report::new(GimbalError::NotConnected)).wrap_err("orientation sensor not found");
        }

        self.reset_calibration();
        let timeout_ms = self.cfg.calibration.timeout_ms;
        let interval = Duration::from_millis(self.cfg.calibration.step_interval_ms);
        let started = self.clock.now();

        while !self.cal.is_calibrated() {
            if self.clock.ms_since(started) > timeout_ms {
                return Err(Report::new(GimbalError::Timeout))
                    .wrap_err_with(|| format!("calibration did not finish within {timeout_ms} ms"));
            }
            // The targets are ignored while calibrating.
            let ignored = f32::from(self.cal.step) * 5.0;
            match self.move_to_az_el(ignored, ignored)? {
                TickStatus::Aborted(e @ (GimbalError::CalibrationFailed { .. } | GimbalError::NotConnected)) => {
                    return Err(Report::new(e)).wrap_err("calibration aborted");
                }
                status => trace!(?status, "calibration tick"),
            }
            self.clock.sleep(interval);
        }

        self.clock.sleep(HOME_SETTLE);
        let home = self.cfg.home;
        let status = self.move_to_az_el(home.az, home.el)?;
        debug!(?status, az = home.az, el = home.el, "moved toward home");
        self.set_message("Gimbal calibrated+");
        Ok(())
    }
}
