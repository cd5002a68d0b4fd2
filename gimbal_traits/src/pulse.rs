//! Pulse width (microseconds) <-> PWM counter ticks.

#[inline]
pub fn us_per_tick(frequency_hz: u32, resolution_bits: u8) -> f32 {
    1_000_000.0 / frequency_hz as f32 / (1u32 << resolution_bits) as f32
}

/// Servo pulse width in microseconds to counter ticks of a
/// `resolution_bits` PWM running at `frequency_hz`.
///
/// Rounds to the nearest tick and saturates at the counter's top.
pub fn pulse_us_to_ticks(pulse_us: f32, frequency_hz: u32, resolution_bits: u8) -> u16 {
    let top = ((1u32 << resolution_bits) - 1) as f32;
    (pulse_us / us_per_tick(frequency_hz, resolution_bits))
        .round()
        .clamp(0.0, top) as u16
}

/// Inverse of [`pulse_us_to_ticks`], exact for tick-aligned pulses.
pub fn ticks_to_pulse_us(ticks: u16, frequency_hz: u32, resolution_bits: u8) -> f32 {
    f32::from(ticks) * us_per_tick(frequency_hz, resolution_bits)
}
