//! # Virtual Output Devices
//!
//! [`OutputDevice`] implementations for the server.
//!
//! - [`VirtualJoystick`]: a uinput joystick with `ABS_X` (steer), `ABS_Y`
//!   (throttle) and `ABS_Z` (brake), each spanning the full wire range
//! - [`TracingOutput`]: logs every change instead of driving a device

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AbsInfo, AbsoluteAxisType, AttributeSet, EventType, InputEvent, Key, UinputAbsSetup};
use tracing::{debug, info, trace};

use super::{OutputAxis, OutputDevice};
use crate::error::{Result, SharedJoystickError};
use crate::wire::protocol::{AXIS_VALUE_MAX, AXIS_VALUE_MIN};

/// Name the virtual device registers under
pub const VIRTUAL_DEVICE_NAME: &str = "Shared Joystick";

/// Absolute axis code backing an output axis.
#[must_use]
pub fn axis_code(axis: OutputAxis) -> AbsoluteAxisType {
    match axis {
        OutputAxis::Steer => AbsoluteAxisType::ABS_X,
        OutputAxis::Throttle => AbsoluteAxisType::ABS_Y,
        OutputAxis::Brake => AbsoluteAxisType::ABS_Z,
    }
}

/// Joystick created through `/dev/uinput`.
pub struct VirtualJoystick {
    device: VirtualDevice,
}

impl VirtualJoystick {
    /// Create the virtual joystick
    ///
    /// # Errors
    ///
    /// Returns `Device` if `/dev/uinput` cannot be opened (usually missing
    /// permissions) or the device cannot be registered.
    pub fn create() -> Result<Self> {
        let map_err = |e: std::io::Error| {
            SharedJoystickError::Device(format!("Failed to create virtual joystick: {}", e))
        };

        // A trigger button makes the kernel and games classify it as a joystick
        let mut keys = AttributeSet::<Key>::new();
        keys.insert(Key::BTN_TRIGGER);

        let mut builder = VirtualDeviceBuilder::new()
            .map_err(map_err)?
            .name(VIRTUAL_DEVICE_NAME)
            .with_keys(&keys)
            .map_err(map_err)?;

        for axis in [OutputAxis::Steer, OutputAxis::Throttle, OutputAxis::Brake] {
            let setup = UinputAbsSetup::new(
                axis_code(axis),
                AbsInfo::new(
                    0,
                    i32::from(AXIS_VALUE_MIN),
                    i32::from(AXIS_VALUE_MAX),
                    0,
                    0,
                    0,
                ),
            );
            builder = builder.with_absolute_axis(&setup).map_err(map_err)?;
        }

        let device = builder.build().map_err(map_err)?;
        info!("Created virtual joystick \"{}\"", VIRTUAL_DEVICE_NAME);
        Ok(Self { device })
    }
}

impl OutputDevice for VirtualJoystick {
    fn set_axis(&mut self, axis: OutputAxis, value: u16) -> Result<()> {
        let event = InputEvent::new(EventType::ABSOLUTE, axis_code(axis).0, i32::from(value));
        self.device
            .emit(&[event])
            .map_err(|e| SharedJoystickError::Device(format!("Failed to emit {:?}: {}", axis, e)))
    }
}

/// Output that only logs, for hosts without uinput access.
#[derive(Debug, Default)]
pub struct TracingOutput {
    last: [Option<u16>; 3],
}

impl TracingOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value set on an axis, if any.
    #[must_use]
    pub fn value(&self, axis: OutputAxis) -> Option<u16> {
        self.last[slot(axis)]
    }
}

fn slot(axis: OutputAxis) -> usize {
    match axis {
        OutputAxis::Steer => 0,
        OutputAxis::Throttle => 1,
        OutputAxis::Brake => 2,
    }
}

impl OutputDevice for TracingOutput {
    fn set_axis(&mut self, axis: OutputAxis, value: u16) -> Result<()> {
        let last = &mut self.last[slot(axis)];
        if *last == Some(value) {
            trace!("{:?} unchanged at {}", axis, value);
        } else {
            debug!("{:?} -> {}", axis, value);
            *last = Some(value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::apply_state;
    use crate::wire::protocol::ControlState;

    #[test]
    fn test_axis_codes() {
        assert_eq!(axis_code(OutputAxis::Steer), AbsoluteAxisType::ABS_X);
        assert_eq!(axis_code(OutputAxis::Throttle), AbsoluteAxisType::ABS_Y);
        assert_eq!(axis_code(OutputAxis::Brake), AbsoluteAxisType::ABS_Z);
    }

    #[test]
    fn test_tracing_output_records_values() {
        let mut output = TracingOutput::new();
        assert_eq!(output.value(OutputAxis::Steer), None);

        apply_state(&mut output, &ControlState::new(0x1234, 0xabcd, 7)).unwrap();
        assert_eq!(output.value(OutputAxis::Steer), Some(0x1234));
        assert_eq!(output.value(OutputAxis::Throttle), Some(0xabcd));
        assert_eq!(output.value(OutputAxis::Brake), Some(7));

        // Setting the same value again is a no-op
        output.set_axis(OutputAxis::Brake, 7).unwrap();
        assert_eq!(output.value(OutputAxis::Brake), Some(7));
    }

    #[test]
    #[ignore] // Requires write access to /dev/uinput
    fn test_create_virtual_joystick() {
        let mut joystick = VirtualJoystick::create().unwrap();
        apply_state(&mut joystick, &ControlState::default()).unwrap();
    }
}
