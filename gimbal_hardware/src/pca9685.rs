//! PCA9685 16-channel PWM controller driving the two gimbal servos.
use std::time::Duration;

use gimbal_traits::{BoxError, PulseActuator};
use rppal::gpio::{Gpio, InputPin};
use rppal::i2c::I2c;
use tracing::{debug, warn};

use crate::error::Result;

const MODE1: u8 = 0x00;
const MODE2: u8 = 0x01;
const LED0_ON_L: u8 = 0x06;
const PRESCALE: u8 = 0xFE;

const MODE1_RESTART: u8 = 0x80;
const MODE1_AI: u8 = 0x20;
const MODE1_SLEEP: u8 = 0x10;
const MODE2_OUTDRV: u8 = 0x04;

const OSC_HZ: f32 = 25_000_000.0;

pub struct Pca9685 {
    i2c: Option<I2c>,
    oe: Option<InputPin>,
}

impl Pca9685 {
    /// Open the controller at `addr` and program its output frequency.
    ///
    /// A controller that does not answer is not an error: the returned
    /// driver reports `is_present() == false` and ignores writes.
    pub fn new(addr: u16, frequency_hz: u32, oe_pin: Option<u8>) -> Result<Self> {
        let oe = match oe_pin {
            Some(pin) => Some(Gpio::new()?.get(pin)?.into_input_pulldown()),
            None => None,
        };

        let mut i2c = I2c::new()?;
        i2c.set_slave_address(addr)?;
        if i2c.smbus_read_byte(MODE1).is_err() {
            warn!(addr, "PWM controller not found");
            return Ok(Self { i2c: None, oe });
        }

        let prescale = (OSC_HZ / (4096.0 * frequency_hz as f32)).round() - 1.0;
        let prescale = prescale.clamp(3.0, 255.0) as u8;
        let old = i2c.smbus_read_byte(MODE1)?;
        i2c.smbus_write_byte(MODE1, (old & !MODE1_RESTART) | MODE1_SLEEP)?;
        i2c.smbus_write_byte(PRESCALE, prescale)?;
        i2c.smbus_write_byte(MODE1, old & !MODE1_SLEEP)?;
        std::thread::sleep(Duration::from_millis(5));
        i2c.smbus_write_byte(MODE1, (old & !MODE1_SLEEP) | MODE1_RESTART | MODE1_AI)?;
        i2c.smbus_write_byte(MODE2, MODE2_OUTDRV)?;
        debug!(addr, frequency_hz, prescale, "PWM controller initialized");

        Ok(Self { i2c: Some(i2c), oe })
    }

    fn set_pwm(&mut self, channel: u8, on: u16, off: u16) -> Result<()> {
        let Some(i2c) = self.i2c.as_mut() else {
            return Ok(());
        };
        let [on_l, on_h] = on.to_le_bytes();
        let [off_l, off_h] = off.to_le_bytes();
        i2c.block_write(LED0_ON_L + 4 * channel, &[on_l, on_h, off_l, off_h])?;
        Ok(())
    }
}

impl PulseActuator for Pca9685 {
    fn is_present(&self) -> bool {
        self.i2c.is_some()
    }

    /// OE is active-low; a high line means the outputs are disabled.
    fn fault(&self) -> bool {
        self.oe.as_ref().is_some_and(InputPin::is_high)
    }

    fn write_ticks(&mut self, channel: u8, ticks: u16) -> std::result::Result<(), BoxError> {
        if channel > 15 {
            return Err(format!("PCA9685 has no channel {channel}").into());
        }
        self.set_pwm(channel, 0, ticks.min(4095))?;
        Ok(())
    }
}
