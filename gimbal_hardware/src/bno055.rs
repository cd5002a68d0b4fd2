//! BNO055 absolute orientation sensor in NDOF fusion mode.
//!
//! Azimuth is the fused heading corrected for magnetic declination,
//! elevation is the pitch Euler angle. The 22-byte offset block starting
//! at `ACCEL_OFFSET_X_LSB` is only accessible in CONFIG mode.
use std::time::Duration;

use gimbal_traits::{
    BoxError, OrientationSensor, SENSOR_OFFSETS_LEN, SensorCalibration, SensorOffsets,
};
use rppal::i2c::I2c;
use tracing::{debug, trace, warn};

use crate::error::{HwError, Result};
use crate::util::{heading_to_azimuth, wait_until_with_timeout};

const CHIP_ID: u8 = 0x00;
const PAGE_ID: u8 = 0x07;
const EULER_H_LSB: u8 = 0x1A;
const TEMP: u8 = 0x34;
const CALIB_STAT: u8 = 0x35;
const SYS_STATUS: u8 = 0x39;
const OPR_MODE: u8 = 0x3D;
const PWR_MODE: u8 = 0x3E;
const SYS_TRIGGER: u8 = 0x3F;
const ACCEL_OFFSET_X_LSB: u8 = 0x55;

const BNO055_ID: u8 = 0xA0;
const MODE_CONFIG: u8 = 0x00;
const MODE_NDOF: u8 = 0x0C;
const POWER_NORMAL: u8 = 0x00;
const TRIGGER_RESET: u8 = 0x20;
const STATUS_FUSION_RUNNING: u8 = 0x05;

const MODE_SWITCH: Duration = Duration::from_millis(25);
const BOOT_TIMEOUT: Duration = Duration::from_millis(1000);
const POLL: Duration = Duration::from_millis(10);

pub struct Bno055 {
    i2c: I2c,
    addr: u16,
    connected: bool,
    declination_deg: f32,
    read_timeout: Duration,
    az: f32,
    el: f32,
    temperature: Option<i8>,
}

impl Bno055 {
    pub fn new(addr: u16, declination_deg: f32, read_timeout: Duration) -> Result<Self> {
        let mut i2c = I2c::new()?;
        i2c.set_slave_address(addr)?;
        let mut s = Self {
            i2c,
            addr,
            connected: false,
            declination_deg,
            read_timeout,
            az: 0.0,
            el: 0.0,
            temperature: None,
        };
        match s.begin() {
            Ok(()) => s.connected = true,
            Err(e) => warn!(addr, error = %e, "orientation sensor not found"),
        }
        Ok(s)
    }

    fn begin(&mut self) -> Result<()> {
        let id_ok = |i2c: &I2c| i2c.smbus_read_byte(CHIP_ID).is_ok_and(|id| id == BNO055_ID);
        if !id_ok(&self.i2c) {
            return Err(HwError::NotFound(self.addr));
        }
        self.i2c.smbus_write_byte(OPR_MODE, MODE_CONFIG)?;
        std::thread::sleep(MODE_SWITCH);
        self.i2c.smbus_write_byte(SYS_TRIGGER, TRIGGER_RESET)?;
        std::thread::sleep(Duration::from_millis(30));
        wait_until_with_timeout(|| id_ok(&self.i2c), BOOT_TIMEOUT, POLL)?;
        self.i2c.smbus_write_byte(PWR_MODE, POWER_NORMAL)?;
        self.i2c.smbus_write_byte(PAGE_ID, 0)?;
        self.i2c.smbus_write_byte(SYS_TRIGGER, 0)?;
        self.i2c.smbus_write_byte(OPR_MODE, MODE_NDOF)?;
        std::thread::sleep(Duration::from_millis(20));
        debug!(addr = self.addr, "orientation sensor in NDOF mode");
        Ok(())
    }

    /// Run `f` in CONFIG mode, returning to NDOF even if it fails.
    fn in_config_mode<T>(&mut self, f: impl FnOnce(&I2c) -> Result<T>) -> Result<T> {
        self.i2c.smbus_write_byte(OPR_MODE, MODE_CONFIG)?;
        std::thread::sleep(MODE_SWITCH);
        let out = f(&self.i2c);
        self.i2c.smbus_write_byte(OPR_MODE, MODE_NDOF)?;
        std::thread::sleep(MODE_SWITCH);
        out
    }

    fn read_euler(&mut self) -> Result<(f32, f32)> {
        let i2c = &self.i2c;
        let fused = || i2c.smbus_read_byte(SYS_STATUS).is_ok_and(|s| s == STATUS_FUSION_RUNNING);
        wait_until_with_timeout(fused, self.read_timeout, POLL).map_err(|_| HwError::Timeout)?;

        let mut buf = [0u8; 6];
        self.i2c.block_read(EULER_H_LSB, &mut buf)?;
        // 1 degree = 16 LSB; order is heading, roll, pitch
        let heading = f32::from(i16::from_le_bytes([buf[0], buf[1]])) / 16.0;
        let pitch = f32::from(i16::from_le_bytes([buf[4], buf[5]])) / 16.0;
        Ok((heading, pitch))
    }
}

impl OrientationSensor for Bno055 {
    fn refresh(&mut self) -> std::result::Result<(), BoxError> {
        if !self.connected {
            return Err(Box::new(HwError::NotFound(self.addr)));
        }
        let (heading, pitch) = self.read_euler()?;
        self.az = heading_to_azimuth(heading, self.declination_deg);
        self.el = pitch;
        self.temperature = self.i2c.smbus_read_byte(TEMP).ok().map(|t| t as i8);
        trace!(heading, az = self.az, el = self.el, "bno055 sample");
        Ok(())
    }

    fn azimuth(&self) -> f32 {
        self.az
    }

    fn elevation(&self) -> f32 {
        self.el
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn temperature_c(&self) -> Option<i8> {
        self.temperature
    }

    fn calibration_status(&self) -> SensorCalibration {
        if !self.connected {
            return SensorCalibration::default();
        }
        let c = self.i2c.smbus_read_byte(CALIB_STAT).unwrap_or(0);
        SensorCalibration {
            sys: (c >> 6) & 0x03,
            gyro: (c >> 4) & 0x03,
            accel: (c >> 2) & 0x03,
            mag: c & 0x03,
        }
    }

    fn reconnect(&mut self) -> std::result::Result<bool, BoxError> {
        match self.begin() {
            Ok(()) => self.connected = true,
            Err(HwError::NotFound(_)) => self.connected = false,
            Err(e) => {
                self.connected = false;
                return Err(Box::new(e));
            }
        }
        debug!(addr = self.addr, connected = self.connected, "orientation sensor restart");
        Ok(self.connected)
    }

    fn read_offsets(&mut self) -> std::result::Result<Option<SensorOffsets>, BoxError> {
        if !self.connected {
            return Err(Box::new(HwError::NotFound(self.addr)));
        }
        let offsets = self.in_config_mode(|i2c| {
            let mut buf = [0u8; SENSOR_OFFSETS_LEN];
            i2c.block_read(ACCEL_OFFSET_X_LSB, &mut buf)?;
            Ok(buf)
        })?;
        Ok(Some(offsets))
    }

    fn write_offsets(&mut self, offsets: &SensorOffsets) -> std::result::Result<(), BoxError> {
        if !self.connected {
            return Err(Box::new(HwError::NotFound(self.addr)));
        }
        self.in_config_mode(|i2c| {
            i2c.block_write(ACCEL_OFFSET_X_LSB, offsets).map_err(HwError::from)
        })?;
        debug!(addr = self.addr, "sensor offsets written");
        Ok(())
    }
}
