pub mod error;
pub mod store;
pub mod util;

#[cfg(feature = "hardware")]
pub mod bno055;
#[cfg(feature = "hardware")]
pub mod pca9685;

pub use store::{FileStore, MemoryStore};

use gimbal_traits::pulse::ticks_to_pulse_us;
use gimbal_traits::{BoxError, OrientationSensor, PulseActuator, SensorCalibration, SensorOffsets};
use std::cell::RefCell;
use std::rc::Rc;

/// Linear plant of one simulated motor, degrees per microsecond.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimMotor {
    pub channel: u8,
    pub az_deg_per_us: f32,
    pub el_deg_per_us: f32,
    /// Pulse width at which this motor contributes nothing.
    pub center_us: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimParams {
    pub center_az: f32,
    pub center_el: f32,
    pub frequency_hz: u32,
    pub resolution_bits: u8,
    pub motors: [SimMotor; 2],
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            center_az: 180.0,
            center_el: 45.0,
            frequency_hz: 50,
            resolution_bits: 12,
            motors: [
                SimMotor {
                    channel: 0,
                    az_deg_per_us: 0.12,
                    el_deg_per_us: 0.0,
                    center_us: 1500.0,
                },
                SimMotor {
                    channel: 1,
                    az_deg_per_us: 0.0,
                    el_deg_per_us: 0.06,
                    center_us: 1500.0,
                },
            ],
        }
    }
}

/// Offsets a freshly calibrated simulated sensor reports: small accel,
/// mag and gyro biases, accel radius 1000, mag radius 480.
const SIM_OFFSETS: SensorOffsets = [
    0xf6, 0xff, 0x0c, 0x00, 0xe2, 0xff, 0x3a, 0x00, 0x91, 0xff, 0x17, 0x01, 0xfe, 0xff, 0x01,
    0x00, 0x00, 0x00, 0xe8, 0x03, 0xe0, 0x01,
];

#[derive(Debug)]
struct Plant {
    params: SimParams,
    pulse_us: [f32; 2],
    present: bool,
    fault: bool,
    connected: bool,
    fail_refreshes: u32,
    writes: Vec<(u8, u16)>,
    offsets: SensorOffsets,
}

impl Plant {
    fn orientation(&self) -> (f32, f32) {
        let mut az = self.params.center_az;
        let mut el = self.params.center_el;
        for (m, pulse) in self.params.motors.iter().zip(self.pulse_us) {
            let d = pulse - m.center_us;
            az += m.az_deg_per_us * d;
            el += m.el_deg_per_us * d;
        }
        (az.rem_euclid(360.0), el.clamp(0.0, 90.0))
    }
}

/// Instantly-settling two-motor gimbal shared by a [`SimSensor`] and a
/// [`SimActuator`]. Clones share the same plant.
#[derive(Debug, Clone)]
pub struct SimGimbal {
    plant: Rc<RefCell<Plant>>,
}

impl SimGimbal {
    pub fn new(params: SimParams) -> Self {
        let pulse_us = [params.motors[0].center_us, params.motors[1].center_us];
        Self {
            plant: Rc::new(RefCell::new(Plant {
                params,
                pulse_us,
                present: true,
                fault: false,
                connected: true,
                fail_refreshes: 0,
                writes: Vec::new(),
                offsets: SIM_OFFSETS,
            })),
        }
    }

    pub fn sensor(&self) -> SimSensor {
        let (az, el) = self.plant.borrow().orientation();
        SimSensor {
            plant: Rc::clone(&self.plant),
            az,
            el,
        }
    }

    pub fn actuator(&self) -> SimActuator {
        SimActuator {
            plant: Rc::clone(&self.plant),
        }
    }

    /// True orientation, independent of any sensor's cache.
    pub fn orientation(&self) -> (f32, f32) {
        self.plant.borrow().orientation()
    }

    pub fn pulse_us(&self) -> [f32; 2] {
        self.plant.borrow().pulse_us
    }

    /// Every (channel, ticks) written, oldest first.
    pub fn writes(&self) -> Vec<(u8, u16)> {
        self.plant.borrow().writes.clone()
    }

    pub fn set_present(&self, present: bool) {
        self.plant.borrow_mut().present = present;
    }

    pub fn set_fault(&self, fault: bool) {
        self.plant.borrow_mut().fault = fault;
    }

    pub fn set_connected(&self, connected: bool) {
        self.plant.borrow_mut().connected = connected;
    }

    /// Offset block currently held by the simulated sensor.
    pub fn sensor_offsets(&self) -> SensorOffsets {
        self.plant.borrow().offsets
    }

    pub fn set_sensor_offsets(&self, offsets: SensorOffsets) {
        self.plant.borrow_mut().offsets = offsets;
    }

    /// Make the next `n` sensor refreshes fail with a timeout.
    pub fn fail_next_refreshes(&self, n: u32) {
        self.plant.borrow_mut().fail_refreshes = n;
    }
}

impl Default for SimGimbal {
    fn default() -> Self {
        Self::new(SimParams::default())
    }
}

pub struct SimSensor {
    plant: Rc<RefCell<Plant>>,
    az: f32,
    el: f32,
}

impl OrientationSensor for SimSensor {
    fn refresh(&mut self) -> Result<(), BoxError> {
        let mut plant = self.plant.borrow_mut();
        if plant.fail_refreshes > 0 {
            plant.fail_refreshes -= 1;
            return Err(Box::new(error::HwError::Timeout));
        }
        let (az, el) = plant.orientation();
        self.az = az;
        self.el = el;
        tracing::trace!(az, el, "sim sensor refresh");
        Ok(())
    }

    fn azimuth(&self) -> f32 {
        self.az
    }

    fn elevation(&self) -> f32 {
        self.el
    }

    fn is_connected(&self) -> bool {
        self.plant.borrow().connected
    }

    fn temperature_c(&self) -> Option<i8> {
        Some(25)
    }

    fn calibration_status(&self) -> SensorCalibration {
        SensorCalibration {
            sys: 3,
            gyro: 3,
            accel: 3,
            mag: 3,
        }
    }

    fn read_offsets(&mut self) -> Result<Option<SensorOffsets>, BoxError> {
        Ok(Some(self.plant.borrow().offsets))
    }

    fn write_offsets(&mut self, offsets: &SensorOffsets) -> Result<(), BoxError> {
        self.plant.borrow_mut().offsets = *offsets;
        Ok(())
    }
}

pub struct SimActuator {
    plant: Rc<RefCell<Plant>>,
}

impl PulseActuator for SimActuator {
    fn is_present(&self) -> bool {
        self.plant.borrow().present
    }

    fn fault(&self) -> bool {
        self.plant.borrow().fault
    }

    fn write_ticks(&mut self, channel: u8, ticks: u16) -> Result<(), BoxError> {
        let mut plant = self.plant.borrow_mut();
        let idx = plant
            .params
            .motors
            .iter()
            .position(|m| m.channel == channel)
            .ok_or_else(|| format!("sim actuator has no channel {channel}"))?;
        let pulse = ticks_to_pulse_us(ticks, plant.params.frequency_hz, plant.params.resolution_bits);
        plant.pulse_us[idx] = pulse;
        plant.writes.push((channel, ticks));
        tracing::trace!(channel, ticks, pulse, "sim actuator write");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_sees_commanded_motion_only_after_refresh() {
        let sim = SimGimbal::default();
        let mut sensor = sim.sensor();
        let mut act = sim.actuator();
        assert_eq!(sensor.azimuth(), 180.0);

        // +100 us on motor 1 at 0.12 deg/us; 1600 us is 327.68 ticks, so use the rounded pulse
        act.write_ticks(0, 328).unwrap();
        assert_eq!(sensor.azimuth(), 180.0);
        sensor.refresh().unwrap();
        let pulse = ticks_to_pulse_us(328, 50, 12);
        let expected = 180.0 + 0.12 * (pulse - 1500.0);
        assert!((sensor.azimuth() - expected).abs() < 1e-3);
        assert_eq!(sensor.elevation(), 45.0);
    }

    #[test]
    fn azimuth_wraps_and_elevation_clamps() {
        let sim = SimGimbal::new(SimParams {
            center_az: 350.0,
            center_el: 85.0,
            motors: [
                SimMotor {
                    channel: 0,
                    az_deg_per_us: 1.0,
                    el_deg_per_us: 1.0,
                    center_us: 0.0,
                },
                SimMotor {
                    channel: 1,
                    az_deg_per_us: 0.0,
                    el_deg_per_us: 0.0,
                    center_us: 0.0,
                },
            ],
            ..SimParams::default()
        });
        let mut act = sim.actuator();
        // ~19.5 us
        act.write_ticks(0, 4).unwrap();
        let (az, el) = sim.orientation();
        assert!(az < 20.0 && az >= 0.0, "az wrapped: {az}");
        assert_eq!(el, 90.0);
    }

    #[test]
    fn unknown_channel_is_an_error() {
        let sim = SimGimbal::default();
        let mut act = sim.actuator();
        assert!(act.write_ticks(7, 300).is_err());
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn injected_refresh_failures_run_out() {
        let sim = SimGimbal::default();
        let mut sensor = sim.sensor();
        sim.fail_next_refreshes(1);
        let err = sensor.refresh().unwrap_err();
        assert!(err.to_string().contains("timeout"));
        assert!(sensor.refresh().is_ok());
    }

    #[test]
    fn sensor_offsets_are_shared_with_the_plant() {
        let sim = SimGimbal::default();
        let mut sensor = sim.sensor();
        assert_eq!(sensor.read_offsets().unwrap(), Some(SIM_OFFSETS));
        let mut other = SIM_OFFSETS;
        other[0] = 0x01;
        sensor.write_offsets(&other).unwrap();
        assert_eq!(sim.sensor_offsets(), other);
    }
}
