//! # Control Frame Decoder
//!
//! Decodes frames produced by the encoder. The decoder is permissive: values are
//! clamped rather than rejected, and chunks with an unknown tag are skipped so that
//! future fields do not break older servers.

use super::protocol::*;
use crate::error::{Result, SharedJoystickError};

/// Decode a frame into a fresh control state
///
/// The input is consumed in 5-byte chunks. Fields that do not appear keep their
/// default value (center / idle / released).
///
/// # Arguments
///
/// * `frame` - Raw datagram payload
///
/// # Returns
///
/// * `Result<ControlState>` - Decoded state
///
/// # Errors
///
/// Returns `Format` if:
/// - A chunk is shorter than 5 bytes (truncated frame)
/// - A recognized tag is followed by anything other than 4 hex digits
///
/// # Examples
///
/// ```
/// use shared_joystick::wire::decoder::decode_frame;
///
/// let state = decode_frame(b"X0000S8000").unwrap();
/// assert_eq!(state.steer(), 0x8000);
///
/// assert!(decode_frame(b"S800").is_err());
/// ```
pub fn decode_frame(frame: &[u8]) -> Result<ControlState> {
    let mut state = ControlState::default();

    for (index, chunk) in frame.chunks(FIELD_LEN).enumerate() {
        if chunk.len() != FIELD_LEN {
            return Err(SharedJoystickError::Format(format!(
                "Chunk {} is {} bytes, expected {}",
                index,
                chunk.len(),
                FIELD_LEN
            )));
        }

        let tag = chunk[0];
        match tag {
            TAG_STEER => state.set_steer(parse_hex_field(tag, &chunk[1..])?),
            TAG_THROTTLE => state.set_throttle(parse_hex_field(tag, &chunk[1..])?),
            TAG_BRAKE => state.set_brake(parse_hex_field(tag, &chunk[1..])?),
            // Unknown tags are consumed without effect
            _ => {}
        }
    }

    Ok(state)
}

/// Parse exactly four ASCII hex digits (either case).
fn parse_hex_field(tag: u8, digits: &[u8]) -> Result<i64> {
    digits.iter().try_fold(0i64, |acc, &digit| {
        let nibble = char::from(digit).to_digit(16).ok_or_else(|| {
            SharedJoystickError::Format(format!(
                "Invalid hex digit 0x{:02x} in '{}' field",
                digit,
                char::from(tag)
            ))
        })?;
        Ok((acc << 4) | i64::from(nibble))
    })
}
