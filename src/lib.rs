//! # Shared Joystick Library
//!
//! Combine a steering wheel, throttle and brake, possibly attached to
//! different machines, into one virtual joystick.
//!
//! Clients calibrate their local devices, normalize every sample and stream
//! fixed-width text frames over UDP. The server averages the frames received
//! in each short window and drives a virtual joystick with the result.

pub mod calibration;
pub mod client;
pub mod config;
pub mod console;
pub mod device;
pub mod error;
pub mod net;
pub mod server;
pub mod shutdown;
pub mod wire;
