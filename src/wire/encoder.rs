//! # Control Frame Encoder
//!
//! Encodes a [`ControlState`] into the 15-byte ASCII frame
//! `S{4 hex}T{4 hex}B{4 hex}`.

use bytes::{BufMut, Bytes, BytesMut};

use super::protocol::*;

/// Lowercase hex digit table
const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Encode a control state into a complete frame
///
/// # Arguments
///
/// * `state` - State to encode
///
/// # Returns
///
/// * `Bytes` - Complete frame (always exactly 15 bytes)
///
/// # Examples
///
/// ```
/// use shared_joystick::wire::encoder::encode_frame;
/// use shared_joystick::wire::protocol::ControlState;
///
/// let frame = encode_frame(&ControlState::default());
/// assert_eq!(&frame[..], b"S8000T0000B0000");
/// ```
pub fn encode_frame(state: &ControlState) -> Bytes {
    let mut buf = BytesMut::with_capacity(FRAME_LEN);
    encode_frame_into(state, &mut buf);
    buf.freeze()
}

/// Append the encoded frame to an existing buffer
///
/// Used by the send loop so one buffer is reused for every frame.
pub fn encode_frame_into(state: &ControlState, buf: &mut BytesMut) {
    buf.reserve(FRAME_LEN);
    put_field(buf, TAG_STEER, state.steer());
    put_field(buf, TAG_THROTTLE, state.throttle());
    put_field(buf, TAG_BRAKE, state.brake());
}

/// Write one tag byte followed by 4 zero-padded lowercase hex digits.
fn put_field(buf: &mut BytesMut, tag: u8, value: u16) {
    buf.put_u8(tag);
    for shift in [12u16, 8, 4, 0] {
        buf.put_u8(HEX_DIGITS[usize::from((value >> shift) & 0xf)]);
    }
}
