pub mod clock;
pub mod pulse;
pub mod record;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use record::{
    CalibrationRecord, PulseLimits, RECORD_LEN, RECORD_MAGIC, SENSOR_OFFSETS_LEN, SensorOffsets,
    StoredScales, offsets_valid,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Self-reported fusion calibration quality, each 0 (none) ..= 3 (full).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorCalibration {
    pub sys: u8,
    pub gyro: u8,
    pub accel: u8,
    pub mag: u8,
}

impl SensorCalibration {
    /// Usable for pointing once every subsystem reports at least 1.
    pub fn is_usable(&self) -> bool {
        self.sys >= 1 && self.gyro >= 1 && self.accel >= 1 && self.mag >= 1
    }

    pub fn is_full(&self) -> bool {
        self.sys == 3 && self.gyro == 3 && self.accel == 3 && self.mag == 3
    }
}

/// Absolute orientation source; the only feedback the controller has.
pub trait OrientationSensor {
    /// Blocking hardware read that updates the cached values.
    fn refresh(&mut self) -> Result<(), BoxError>;
    /// Last cached azimuth, degrees in [0, 360).
    fn azimuth(&self) -> f32;
    /// Last cached elevation, degrees in [0, 90].
    fn elevation(&self) -> f32;
    fn is_connected(&self) -> bool;

    /// Reporting only.
    fn temperature_c(&self) -> Option<i8> {
        None
    }

    /// Reporting only.
    fn calibration_status(&self) -> SensorCalibration {
        SensorCalibration::default()
    }

    /// Try to bring a lost sensor back. Returns whether it is connected now.
    fn reconnect(&mut self) -> Result<bool, BoxError> {
        Ok(self.is_connected())
    }

    /// Current calibration offsets, or `None` if the sensor keeps none.
    fn read_offsets(&mut self) -> Result<Option<SensorOffsets>, BoxError> {
        Ok(None)
    }

    /// Install previously saved offsets.
    fn write_offsets(&mut self, _offsets: &SensorOffsets) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Pulse-width servo driver with per-channel tick resolution.
pub trait PulseActuator {
    /// Whether the controller hardware answered at startup.
    fn is_present(&self) -> bool;
    /// Output-disable / fault line asserted.
    fn fault(&self) -> bool;
    fn write_ticks(&mut self, channel: u8, ticks: u16) -> Result<(), BoxError>;
}

/// Durable home of the calibration record.
pub trait CalibrationStore {
    /// `Ok(None)` when the storage was never written or the marker is missing.
    fn load(&mut self) -> Result<Option<CalibrationRecord>, BoxError>;
    fn save(&mut self, record: &CalibrationRecord) -> Result<(), BoxError>;
}

impl<T: OrientationSensor + ?Sized> OrientationSensor for Box<T> {
    fn refresh(&mut self) -> Result<(), BoxError> {
        (**self).refresh()
    }
    fn azimuth(&self) -> f32 {
        (**self).azimuth()
    }
    fn elevation(&self) -> f32 {
        (**self).elevation()
    }
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
    fn temperature_c(&self) -> Option<i8> {
        (**self).temperature_c()
    }
    fn calibration_status(&self) -> SensorCalibration {
        (**self).calibration_status()
    }
    fn reconnect(&mut self) -> Result<bool, BoxError> {
        (**self).reconnect()
    }
    fn read_offsets(&mut self) -> Result<Option<SensorOffsets>, BoxError> {
        (**self).read_offsets()
    }
    fn write_offsets(&mut self, offsets: &SensorOffsets) -> Result<(), BoxError> {
        (**self).write_offsets(offsets)
    }
}

impl<T: PulseActuator + ?Sized> PulseActuator for Box<T> {
    fn is_present(&self) -> bool {
        (**self).is_present()
    }
    fn fault(&self) -> bool {
        (**self).fault()
    }
    fn write_ticks(&mut self, channel: u8, ticks: u16) -> Result<(), BoxError> {
        (**self).write_ticks(channel, ticks)
    }
}

impl<T: CalibrationStore + ?Sized> CalibrationStore for Box<T> {
    fn load(&mut self) -> Result<Option<CalibrationRecord>, BoxError> {
        (**self).load()
    }
    fn save(&mut self, record: &CalibrationRecord) -> Result<(), BoxError> {
        (**self).save(record)
    }
}
