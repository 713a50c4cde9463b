//! # Wire Protocol Module
//!
//! The control frame exchanged over UDP.
//!
//! This module handles:
//! - The [`protocol::ControlState`] type and its clamping rules
//! - Encoding into the fixed 15-byte `S{hex}T{hex}B{hex}` frame
//! - Permissive decoding (unknown tags skipped, bad chunks rejected)

pub mod protocol;
pub mod encoder;
pub mod decoder;
