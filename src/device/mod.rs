//! # Device Module
//!
//! Input and output device abstractions.
//!
//! This module handles:
//! - Opaque device handles ([`DeviceId`], [`AxisRef`]) used as lookup keys
//! - The [`DeviceInputSource`] trait consumed by calibration and the send loop
//! - The [`OutputDevice`] trait driven by the server
//! - Linux implementations over evdev / uinput

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::wire::protocol::ControlState;

pub mod evdev_input;
pub mod virtual_output;

/// Opaque handle for one enumerated input device.
///
/// Ids are enumeration indices and are only meaningful within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub usize);

/// One axis of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AxisRef {
    pub device: DeviceId,
    pub axis: usize,
}

impl AxisRef {
    #[must_use]
    pub fn new(device: DeviceId, axis: usize) -> Self {
        Self { device, axis }
    }
}

impl fmt::Display for AxisRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device {} axis {}", self.device.0, self.axis)
    }
}

/// Description of an enumerated input device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: String,
    pub axis_count: usize,
}

/// A discrete button transition from any button of any device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEdge {
    Pressed,
    Released,
}

/// Current raw value of every axis of every device, taken at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisSnapshot {
    pub devices: Vec<(DeviceId, Vec<f32>)>,
}

impl AxisSnapshot {
    /// Iterates over `(axis, raw value)` pairs in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (AxisRef, f32)> + '_ {
        self.devices.iter().flat_map(|(device, values)| {
            values
                .iter()
                .enumerate()
                .map(move |(axis, &value)| (AxisRef::new(*device, axis), value))
        })
    }
}

/// Source of raw axis samples and button edges.
///
/// Axis reads are non-blocking and return the last known value. Button edges
/// block until the next press or release arrives from any device.
#[async_trait]
pub trait DeviceInputSource: Send {
    /// Lists the connected devices.
    fn devices(&self) -> Vec<DeviceInfo>;

    /// Reads the current raw value of one axis.
    fn axis_value(&mut self, axis: AxisRef) -> Result<f32>;

    /// Waits for the next button press or release.
    ///
    /// Must be cancel safe: dropping the future may not lose an edge.
    async fn next_button_edge(&mut self) -> Result<ButtonEdge>;

    /// Reads every axis of every device.
    fn snapshot(&mut self) -> Result<AxisSnapshot> {
        let mut devices = Vec::new();
        for info in self.devices() {
            let values = (0..info.axis_count)
                .map(|axis| self.axis_value(AxisRef::new(info.id, axis)))
                .collect::<Result<Vec<_>>>()?;
            devices.push((info.id, values));
        }
        Ok(AxisSnapshot { devices })
    }
}

/// Output axes of the virtual device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputAxis {
    Steer,
    Throttle,
    Brake,
}

/// Virtual device the server drives.
///
/// Setting an axis is immediate and idempotent.
#[cfg_attr(test, mockall::automock)]
pub trait OutputDevice: Send {
    fn set_axis(&mut self, axis: OutputAxis, value: u16) -> Result<()>;
}

/// Pushes every field of a state to the output device.
pub fn apply_state<O: OutputDevice + ?Sized>(output: &mut O, state: &ControlState) -> Result<()> {
    output.set_axis(OutputAxis::Steer, state.steer())?;
    output.set_axis(OutputAxis::Throttle, state.throttle())?;
    output.set_axis(OutputAxis::Brake, state.brake())?;
    Ok(())
}
