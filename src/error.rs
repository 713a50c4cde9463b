//! # Error Types
//!
//! Custom error types for Shared Joystick using `thiserror`.

use thiserror::Error;

use crate::device::AxisRef;

/// Main error type for Shared Joystick
#[derive(Debug, Error)]
pub enum SharedJoystickError {
    /// Malformed wire frame (wrong chunk length, bad hex digits)
    #[error("Frame format error: {0}")]
    Format(String),

    /// The two sweeps of a bidirectional calibration moved different axes
    #[error("Calibration mismatch: first sweep moved {first}, second sweep moved {second}")]
    CalibrationMismatch { first: AxisRef, second: AxisRef },

    /// No axis moved during a calibration sweep
    #[error("No movement detected on any axis")]
    NoMovementDetected,

    /// Both steering sweeps ended on the same side of center
    #[error("Steering directions are not on opposite sides of center")]
    DirectionsNotOpposed,

    /// No usable input device is connected
    #[error("No input devices with axes and buttons found")]
    DeviceNotFound,

    /// Input or output device failure
    #[error("Device error: {0}")]
    Device(String),

    /// Shutdown was requested while waiting
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Calibration profile (de)serialization errors
    #[error("Calibration profile error: {0}")]
    Profile(#[from] serde_json::Error),
}

impl SharedJoystickError {
    /// Whether the operator can fix this by repeating the calibration step.
    #[must_use]
    pub fn is_retryable_calibration(&self) -> bool {
        matches!(
            self,
            Self::CalibrationMismatch { .. } | Self::NoMovementDetected | Self::DirectionsNotOpposed
        )
    }
}

/// Result type alias for Shared Joystick
pub type Result<T> = std::result::Result<T, SharedJoystickError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;

    #[test]
    fn test_retryable_calibration_errors() {
        let first = AxisRef::new(DeviceId(0), 0);
        let second = AxisRef::new(DeviceId(1), 2);

        assert!(SharedJoystickError::CalibrationMismatch { first, second }.is_retryable_calibration());
        assert!(SharedJoystickError::NoMovementDetected.is_retryable_calibration());
        assert!(SharedJoystickError::DirectionsNotOpposed.is_retryable_calibration());
        assert!(!SharedJoystickError::Cancelled.is_retryable_calibration());
        assert!(!SharedJoystickError::Format("bad".into()).is_retryable_calibration());
    }

    #[test]
    fn test_mismatch_message_names_both_axes() {
        let err = SharedJoystickError::CalibrationMismatch {
            first: AxisRef::new(DeviceId(0), 1),
            second: AxisRef::new(DeviceId(2), 3),
        };
        let msg = err.to_string();
        assert!(msg.contains("device 0 axis 1"));
        assert!(msg.contains("device 2 axis 3"));
    }
}
