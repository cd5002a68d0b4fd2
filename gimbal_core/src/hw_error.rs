//! Maps `Box<dyn Error>` from trait boundaries to typed `GimbalError`.
//!
//! The traits in `gimbal_traits` use `Box<dyn Error + Send + Sync>` so any
//! driver can plug in; this module converts those to our typed error enum,
//! with a feature-gated path for `gimbal_hardware::HwError` downcasting.

use crate::error::GimbalError;

/// Map a trait-boundary error to a typed `GimbalError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> GimbalError {
    #[cfg(feature = "hardware-errors")]
    {
        use gimbal_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout | HwError::DataReadyTimeout => GimbalError::Timeout,
                HwError::NotFound(_) => GimbalError::NotConnected,
                HwError::Io(_) | HwError::Record(_) => GimbalError::Storage(hw.to_string()),
                other => GimbalError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        GimbalError::Timeout
    } else {
        GimbalError::Hardware(s)
    }
}
