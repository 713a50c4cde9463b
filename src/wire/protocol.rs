//! # Control Frame Protocol Constants and Types
//!
//! Core definitions for the fixed-width control frame exchanged between clients
//! and the server.

use std::fmt;
use std::str::FromStr;

use crate::error::SharedJoystickError;

/// Default UDP port for control frames
pub const DEFAULT_PORT: u16 = 42069;

/// Length of one encoded field: tag byte + 4 hex digits
pub const FIELD_LEN: usize = 5;

/// Length of a complete frame (steer, throttle, brake)
pub const FRAME_LEN: usize = 3 * FIELD_LEN;

/// Steering field tag
pub const TAG_STEER: u8 = b'S';
/// Throttle field tag
pub const TAG_THROTTLE: u8 = b'T';
/// Brake field tag
pub const TAG_BRAKE: u8 = b'B';

/// Axis value range (16-bit unsigned)
pub const AXIS_VALUE_MIN: u16 = 0;
pub const AXIS_VALUE_MAX: u16 = 0xffff;

pub const STEER_FULL_LEFT: u16 = AXIS_VALUE_MIN;
pub const STEER_CENTER: u16 = 0x8000;
pub const STEER_FULL_RIGHT: u16 = AXIS_VALUE_MAX;
pub const THROTTLE_IDLE: u16 = AXIS_VALUE_MIN;
pub const THROTTLE_OPEN: u16 = AXIS_VALUE_MAX;
pub const BRAKE_RELEASED: u16 = AXIS_VALUE_MIN;
pub const BRAKE_APPLIED: u16 = AXIS_VALUE_MAX;

/// Scale applied to a signed steering proportion (-1.0..=1.0) around center.
const STEER_HALF_SCALE: f32 = 32767.0;

/// Clamps any integer into the 16-bit axis range.
///
/// Out-of-range values are clamped silently; this is the permissive policy used
/// by every setter and by the decoder.
///
/// # Examples
///
/// ```
/// use shared_joystick::wire::protocol::clamp_axis_value;
///
/// assert_eq!(clamp_axis_value(-5), 0);
/// assert_eq!(clamp_axis_value(70_000), 65535);
/// assert_eq!(clamp_axis_value(1234), 1234);
/// ```
#[must_use]
pub fn clamp_axis_value(value: i64) -> u16 {
    value.clamp(i64::from(AXIS_VALUE_MIN), i64::from(AXIS_VALUE_MAX)) as u16
}

/// Rounds a float into the axis range. NaN maps to 0.
fn float_to_axis_value(value: f32) -> u16 {
    if value.is_nan() {
        return AXIS_VALUE_MIN;
    }
    // `as` saturates at the i64 bounds, clamp handles the rest
    clamp_axis_value(value.round() as i64)
}

/// The commanded steer/throttle/brake state.
///
/// All fields always hold a value in `0..=65535`.
///
/// # Examples
///
/// ```
/// use shared_joystick::wire::protocol::ControlState;
///
/// let state = ControlState::default();
/// assert_eq!(state.steer(), 32768);
/// assert_eq!(state.throttle(), 0);
/// assert_eq!(state.brake(), 0);
/// assert_eq!(state.to_string(), "S8000T0000B0000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlState {
    steer: u16,
    throttle: u16,
    brake: u16,
}

impl Default for ControlState {
    /// Steering centered, throttle idle, brake released.
    fn default() -> Self {
        Self {
            steer: STEER_CENTER,
            throttle: THROTTLE_IDLE,
            brake: BRAKE_RELEASED,
        }
    }
}

impl ControlState {
    /// Creates a state from arbitrary integers, clamping each into range.
    #[must_use]
    pub fn new(steer: i64, throttle: i64, brake: i64) -> Self {
        Self {
            steer: clamp_axis_value(steer),
            throttle: clamp_axis_value(throttle),
            brake: clamp_axis_value(brake),
        }
    }

    #[must_use]
    pub fn steer(&self) -> u16 {
        self.steer
    }

    #[must_use]
    pub fn throttle(&self) -> u16 {
        self.throttle
    }

    #[must_use]
    pub fn brake(&self) -> u16 {
        self.brake
    }

    pub fn set_steer(&mut self, value: i64) {
        self.steer = clamp_axis_value(value);
    }

    pub fn set_throttle(&mut self, value: i64) {
        self.throttle = clamp_axis_value(value);
    }

    pub fn set_brake(&mut self, value: i64) {
        self.brake = clamp_axis_value(value);
    }

    /// Sets steering from a signed proportion (-1.0 = full left, 1.0 = full right).
    ///
    /// Maps with `round(f * 32767 + 32767)`, so `0.0` lands on 32767.
    pub fn set_steer_from_float(&mut self, proportion: f32) {
        self.steer = float_to_axis_value(proportion * STEER_HALF_SCALE + STEER_HALF_SCALE);
    }

    /// Sets throttle from a proportion (0.0 = idle, 1.0 = fully open).
    pub fn set_throttle_from_float(&mut self, proportion: f32) {
        self.throttle = float_to_axis_value(proportion * f32::from(AXIS_VALUE_MAX));
    }

    /// Sets brake from a proportion (0.0 = released, 1.0 = fully applied).
    pub fn set_brake_from_float(&mut self, proportion: f32) {
        self.brake = float_to_axis_value(proportion * f32::from(AXIS_VALUE_MAX));
    }
}

impl fmt::Display for ControlState {
    /// Formats the state exactly as it appears on the wire.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "S{:04x}T{:04x}B{:04x}",
            self.steer, self.throttle, self.brake
        )
    }
}

impl FromStr for ControlState {
    type Err = SharedJoystickError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        super::decoder::decode_frame(s.as_bytes())
    }
}
