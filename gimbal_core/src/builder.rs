//! Type-state builder for `Gimbal` and the generic `build_gimbal` constructor.
//!
//! The builder enforces at compile time that the sensor, actuator and store
//! are provided before `build()` is available. `try_build()` is always
//! available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use gimbal_traits::{CalibrationStore, Clock, MonotonicClock, OrientationSensor, PulseActuator};

use crate::config::{
    CalibrationCfg, ControlCfg, GimbalCfg, HomeCfg, LimitsCfg, PwmCfg, RecalCfg,
};
use crate::controller::GimbalController;
use crate::error::{BuildError, Result};

/// Controller over boxed collaborators, as assembled by the builder.
pub type Gimbal = GimbalController<
    Box<dyn OrientationSensor>,
    Box<dyn PulseActuator>,
    Box<dyn CalibrationStore>,
>;

impl Gimbal {
    /// Start building a Gimbal.
    pub fn builder() -> GimbalBuilder<Missing, Missing, Missing> {
        GimbalBuilder::default()
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Gimbal`. Configuration is validated on `build()`.
pub struct GimbalBuilder<S, A, P> {
    sensor: Option<Box<dyn OrientationSensor>>,
    actuator: Option<Box<dyn PulseActuator>>,
    store: Option<Box<dyn CalibrationStore>>,
    cfg: GimbalCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _s: PhantomData<S>,
    _a: PhantomData<A>,
    _p: PhantomData<P>,
}

impl Default for GimbalBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            sensor: None,
            actuator: None,
            store: None,
            cfg: GimbalCfg::default(),
            clock: None,
            _s: PhantomData,
            _a: PhantomData,
            _p: PhantomData,
        }
    }
}

fn validate(cfg: &GimbalCfg) -> std::result::Result<(), BuildError> {
    let pwm = &cfg.pwm;
    if pwm.frequency_hz == 0 {
        return Err(BuildError::InvalidConfig("pwm frequency must be > 0"));
    }
    if !(8..=16).contains(&pwm.resolution_bits) {
        return Err(BuildError::InvalidConfig("pwm resolution must be 8..=16 bits"));
    }
    if pwm.channels[0] == pwm.channels[1] {
        return Err(BuildError::InvalidConfig("motors must use different pwm channels"));
    }
    if cfg.limits.motors.iter().any(|l| l.min_us >= l.max_us) {
        return Err(BuildError::InvalidConfig("motor min pulse must be < max pulse"));
    }
    if cfg.control.update_period_ms == 0 {
        return Err(BuildError::InvalidConfig("update_period_ms must be >= 1"));
    }
    if !(cfg.control.max_settle_deg > 0.0) {
        return Err(BuildError::InvalidConfig("max_settle_deg must be > 0"));
    }
    let c = &cfg.calibration;
    if !(c.cal_frac > 0.0 && c.cal_frac < 1.0) {
        return Err(BuildError::InvalidConfig("cal_frac must be in (0, 1)"));
    }
    if !(c.max_scale > 0.0) {
        return Err(BuildError::InvalidConfig("max_scale must be > 0"));
    }
    if c.min_motion_deg.is_sign_negative() {
        return Err(BuildError::InvalidConfig("min_motion_deg must be >= 0"));
    }
    if c.max_attempts == 0 {
        return Err(BuildError::InvalidConfig("max_attempts must be >= 1"));
    }
    if !(cfg.recal.min_angle_deg > 0.0) {
        return Err(BuildError::InvalidConfig("min_angle_deg must be > 0"));
    }
    if !(cfg.recal.max_change > 0.0 && cfg.recal.max_change < 1.0) {
        return Err(BuildError::InvalidConfig("max_change must be in (0, 1)"));
    }
    Ok(())
}

impl<S, A, P> GimbalBuilder<S, A, P> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Gimbal> {
        let sensor = self
            .sensor
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSensor))?;
        let actuator = self
            .actuator
            .ok_or_else(|| eyre::Report::new(BuildError::MissingActuator))?;
        let store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;
        build_gimbal(sensor, actuator, store, self.cfg, self.clock)
    }
}

/// Chainable setters that do not affect type-state.
impl<S, A, P> GimbalBuilder<S, A, P> {
    pub fn with_config(mut self, cfg: GimbalCfg) -> Self {
        self.cfg = cfg;
        self
    }
    pub fn with_pwm(mut self, pwm: PwmCfg) -> Self {
        self.cfg.pwm = pwm;
        self
    }
    pub fn with_limits(mut self, limits: LimitsCfg) -> Self {
        self.cfg.limits = limits;
        self
    }
    pub fn with_control(mut self, control: ControlCfg) -> Self {
        self.cfg.control = control;
        self
    }
    pub fn with_calibration(mut self, calibration: CalibrationCfg) -> Self {
        self.cfg.calibration = calibration;
        self
    }
    pub fn with_recal(mut self, recal: RecalCfg) -> Self {
        self.cfg.recal = recal;
        self
    }
    pub fn with_home(mut self, home: HomeCfg) -> Self {
        self.cfg.home = home;
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }
}

// Setters that advance type-state

impl<A, P> GimbalBuilder<Missing, A, P> {
    pub fn with_sensor(self, sensor: impl OrientationSensor + 'static) -> GimbalBuilder<Set, A, P> {
        GimbalBuilder {
            sensor: Some(Box::new(sensor)),
            actuator: self.actuator,
            store: self.store,
            cfg: self.cfg,
            clock: self.clock,
            _s: PhantomData,
            _a: PhantomData,
            _p: PhantomData,
        }
    }
}

impl<S, P> GimbalBuilder<S, Missing, P> {
    pub fn with_actuator(
        self,
        actuator: impl PulseActuator + 'static,
    ) -> GimbalBuilder<S, Set, P> {
        GimbalBuilder {
            sensor: self.sensor,
            actuator: Some(Box::new(actuator)),
            store: self.store,
            cfg: self.cfg,
            clock: self.clock,
            _s: PhantomData,
            _a: PhantomData,
            _p: PhantomData,
        }
    }
}

impl<S, A> GimbalBuilder<S, A, Missing> {
    pub fn with_store(self, store: impl CalibrationStore + 'static) -> GimbalBuilder<S, A, Set> {
        GimbalBuilder {
            sensor: self.sensor,
            actuator: self.actuator,
            store: Some(Box::new(store)),
            cfg: self.cfg,
            clock: self.clock,
            _s: PhantomData,
            _a: PhantomData,
            _p: PhantomData,
        }
    }
}

impl GimbalBuilder<Set, Set, Set> {
    /// Validate and build. Only available when sensor, actuator and store are set.
    pub fn build(self) -> Result<Gimbal> {
        self.try_build()
    }
}

/// Build a statically-dispatched controller from concrete collaborators.
///
/// Validates `cfg`, then loads the stored calibration.
pub fn build_gimbal<S, A, P>(
    sensor: S,
    actuator: A,
    store: P,
    cfg: GimbalCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<GimbalController<S, A, P>>
where
    S: OrientationSensor,
    A: PulseActuator,
    P: CalibrationStore,
{
    validate(&cfg).map_err(eyre::Report::new)?;
    let clock = clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));
    GimbalController::assemble(sensor, actuator, store, cfg, clock)
}
