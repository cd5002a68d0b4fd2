//! Fixed-layout calibration record persisted by a `CalibrationStore`.
//!
//! Layout (52 bytes, little-endian):
//!
//! | offset | field                                      |
//! |--------|--------------------------------------------|
//! | 0      | magic `u32` (`RECORD_MAGIC`)               |
//! | 4      | mot1 min, mot1 max, mot2 min, mot2 max `u16` |
//! | 12     | m1 az, m1 el, m2 az, m2 el scale `f32`     |
//! | 28     | azimuth motor index `u8`                   |
//! | 29     | calibration step `u8`                      |
//! | 30     | sensor offset block, 22 raw bytes          |
//!
//! Validity is decided by the magic marker alone. There is no checksum.
//! A 30-byte record written before the offset block existed still
//! decodes, with the offsets zeroed (not valid).

/// Sentinel written into every record the controller saves.
pub const RECORD_MAGIC: u32 = 0x5a5a_a5a5;

/// Encoded size of a `CalibrationRecord`.
pub const RECORD_LEN: usize = BASE_LEN + SENSOR_OFFSETS_LEN;

/// Limits, scales, assignment and step; the shortest decodable record.
const BASE_LEN: usize = 30;

/// Size of the orientation sensor's offset/radius register block.
pub const SENSOR_OFFSETS_LEN: usize = 22;

/// Raw accelerometer, magnetometer and gyroscope offsets plus radii, in
/// register order. All zeroes means the sensor was never calibrated.
pub type SensorOffsets = [u8; SENSOR_OFFSETS_LEN];

/// Whether an offset block holds a real calibration.
pub fn offsets_valid(offsets: &SensorOffsets) -> bool {
    offsets.iter().any(|&b| b != 0)
}

/// Pulse-width limits of one motor, microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PulseLimits {
    pub min_us: u16,
    pub max_us: u16,
}

/// Scale factors of one motor, microseconds per degree. 0.0 means undefined.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StoredScales {
    pub az: f32,
    pub el: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRecord {
    pub magic: u32,
    pub limits: [PulseLimits; 2],
    pub scales: [StoredScales; 2],
    pub az_motor: u8,
    pub step: u8,
    pub sensor_offsets: SensorOffsets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordDecodeError {
    /// Too few bytes for even the limits and scales.
    Truncated(usize),
    /// The marker did not match; the record was never written.
    BadMagic(u32),
}

impl std::fmt::Display for RecordDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated(n) => write!(f, "calibration record truncated: {n} bytes, need at least {BASE_LEN}"),
            Self::BadMagic(m) => write!(f, "calibration record marker mismatch: 0x{m:08x}"),
        }
    }
}

impl std::error::Error for RecordDecodeError {}

impl CalibrationRecord {
    /// A marked, uncalibrated record carrying only motor limits.
    pub fn with_limits(limits: [PulseLimits; 2]) -> Self {
        Self {
            magic: RECORD_MAGIC,
            limits,
            scales: [StoredScales::default(); 2],
            az_motor: 0,
            step: 0,
            sensor_offsets: [0; SENSOR_OFFSETS_LEN],
        }
    }

    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        let mut at = 4;
        for lim in &self.limits {
            out[at..at + 2].copy_from_slice(&lim.min_us.to_le_bytes());
            out[at + 2..at + 4].copy_from_slice(&lim.max_us.to_le_bytes());
            at += 4;
        }
        for s in &self.scales {
            out[at..at + 4].copy_from_slice(&s.az.to_le_bytes());
            out[at + 4..at + 8].copy_from_slice(&s.el.to_le_bytes());
            at += 8;
        }
        out[28] = self.az_motor;
        out[29] = self.step;
        out[BASE_LEN..].copy_from_slice(&self.sensor_offsets);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordDecodeError> {
        if bytes.len() < BASE_LEN {
            return Err(RecordDecodeError::Truncated(bytes.len()));
        }
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let f32_at = |i: usize| f32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != RECORD_MAGIC {
            return Err(RecordDecodeError::BadMagic(magic));
        }
        let mut sensor_offsets = [0; SENSOR_OFFSETS_LEN];
        if let Some(block) = bytes.get(BASE_LEN..RECORD_LEN) {
            sensor_offsets.copy_from_slice(block);
        }
        Ok(Self {
            magic,
            limits: [
                PulseLimits {
                    min_us: u16_at(4),
                    max_us: u16_at(6),
                },
                PulseLimits {
                    min_us: u16_at(8),
                    max_us: u16_at(10),
                },
            ],
            scales: [
                StoredScales {
                    az: f32_at(12),
                    el: f32_at(16),
                },
                StoredScales {
                    az: f32_at(20),
                    el: f32_at(24),
                },
            ],
            az_motor: bytes[28],
            step: bytes[29],
            sensor_offsets,
        })
    }
}
