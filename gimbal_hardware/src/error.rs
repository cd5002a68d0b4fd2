use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("i2c error: {0}")]
    I2c(String),
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("sensor read timeout")]
    Timeout,
    #[error("device not ready before timeout")]
    DataReadyTimeout,
    #[error("device not found at i2c address 0x{0:02x}")]
    NotFound(u16),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("calibration record: {0}")]
    Record(#[from] gimbal_traits::record::RecordDecodeError),
}

pub type Result<T> = std::result::Result<T, HwError>;

#[cfg(feature = "hardware")]
impl From<rppal::i2c::Error> for HwError {
    fn from(e: rppal::i2c::Error) -> Self {
        HwError::I2c(e.to_string())
    }
}

#[cfg(feature = "hardware")]
impl From<rppal::gpio::Error> for HwError {
    fn from(e: rppal::gpio::Error) -> Self {
        HwError::Gpio(e.to_string())
    }
}
