//! # Evdev Input Source
//!
//! Reads every connected joystick-like device through the Linux evdev
//! interface.
//!
//! ## Device Selection
//!
//! All `/dev/input/event*` nodes are scanned in path order. A node is used when
//! it reports at least one absolute axis and at least one key, which covers
//! wheels, pedal sets and gamepads while skipping keyboards and mice.
//!
//! ## Values
//!
//! Axis values are read on demand from the kernel's absolute state and scaled
//! from the device's `[minimum, maximum]` to `[-1.0, 1.0]`. Button edges from
//! every device are forwarded by one reader task per device into a shared
//! channel.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use evdev::{AbsoluteAxisType, Device, EventStream, EventType, InputEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{AxisRef, AxisSnapshot, ButtonEdge, DeviceId, DeviceInfo, DeviceInputSource};
use crate::error::{Result, SharedJoystickError};

/// Buffered button edges across all devices
const EDGE_CHANNEL_CAPACITY: usize = 64;

/// Key event values
const KEY_RELEASED: i32 = 0;
const KEY_PRESSED: i32 = 1;

/// Scales a raw absolute value from `[min, max]` to `[-1.0, 1.0]`.
///
/// Degenerate ranges read as 0.0.
///
/// # Examples
///
/// ```
/// use shared_joystick::device::evdev_input::scale_abs;
///
/// assert_eq!(scale_abs(0, 0, 255), -1.0);
/// assert_eq!(scale_abs(255, 0, 255), 1.0);
/// assert_eq!(scale_abs(0, -32768, 32768), 0.0);
/// ```
#[must_use]
pub fn scale_abs(value: i32, min: i32, max: i32) -> f32 {
    if max <= min {
        return 0.0;
    }
    let span = f64::from(max) - f64::from(min);
    (2.0 * (f64::from(value) - f64::from(min)) / span - 1.0) as f32
}

/// Converts a key event into a button edge. Autorepeat and non-key events map
/// to `None`.
#[must_use]
pub fn button_edge(event: &InputEvent) -> Option<ButtonEdge> {
    if event.event_type() != EventType::KEY {
        return None;
    }
    match event.value() {
        KEY_PRESSED => Some(ButtonEdge::Pressed),
        KEY_RELEASED => Some(ButtonEdge::Released),
        _ => None,
    }
}

struct InputDevice {
    name: String,
    path: PathBuf,
    device: Device,
    axes: Vec<AbsoluteAxisType>,
}

impl InputDevice {
    fn read_axes(&self) -> Result<Vec<f32>> {
        let state = self.device.get_abs_state().map_err(|e| {
            SharedJoystickError::Device(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        Ok(self
            .axes
            .iter()
            .map(|axis| {
                let info = state[axis.0 as usize];
                scale_abs(info.value, info.minimum, info.maximum)
            })
            .collect())
    }
}

/// All joystick-like evdev devices, opened together.
pub struct EvdevInputSource {
    devices: Vec<InputDevice>,
    edges: mpsc::Receiver<ButtonEdge>,
    readers: Vec<JoinHandle<()>>,
}

impl EvdevInputSource {
    /// Open every joystick-like device under `/dev/input`
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - `DeviceNotFound`: no device has both axes and buttons
    /// - `Device`: `/dev/input` cannot be read or an event stream cannot be set up
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example() -> shared_joystick::error::Result<()> {
    /// use shared_joystick::device::evdev_input::EvdevInputSource;
    /// use shared_joystick::device::DeviceInputSource;
    ///
    /// let source = EvdevInputSource::open()?;
    /// for device in source.devices() {
    ///     println!("{}: {} axes", device.name, device.axis_count);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn open() -> Result<Self> {
        Self::open_dir(Path::new("/dev/input"))
    }

    /// Open every joystick-like device in `input_dir`
    ///
    /// # Errors
    ///
    /// Same as [`EvdevInputSource::open`].
    pub fn open_dir(input_dir: &Path) -> Result<Self> {
        if !input_dir.exists() {
            return Err(SharedJoystickError::Device(format!(
                "{} directory not found",
                input_dir.display()
            )));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(input_dir)
            .map_err(|e| {
                SharedJoystickError::Device(format!("Failed to read {}: {}", input_dir.display(), e))
            })?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with("event"))
            })
            .collect();

        // Sorted so device ids are stable across runs with the same hardware
        paths.sort();

        let (tx, edges) = mpsc::channel(EDGE_CHANNEL_CAPACITY);
        let mut devices = Vec::new();
        let mut readers = Vec::new();

        for path in paths {
            let device = match Device::open(&path) {
                Ok(device) => device,
                Err(e) => {
                    // Permission denied or other errors - skip device
                    debug!("Could not open {}: {}", path.display(), e);
                    continue;
                }
            };

            let axes: Vec<AbsoluteAxisType> = device
                .supported_absolute_axes()
                .map(|axes| axes.iter().collect())
                .unwrap_or_default();
            let has_keys = device
                .supported_keys()
                .is_some_and(|keys| keys.iter().next().is_some());
            if axes.is_empty() || !has_keys {
                debug!("Skipping {}: not a joystick", path.display());
                continue;
            }

            // A second handle feeds the reader task; the first keeps serving
            // absolute state reads
            let stream = Device::open(&path)
                .and_then(Device::into_event_stream)
                .map_err(|e| {
                    SharedJoystickError::Device(format!(
                        "Failed to stream events from {}: {}",
                        path.display(),
                        e
                    ))
                })?;

            let name = device.name().unwrap_or("Unknown Device").to_string();
            info!(
                "Using input device {} at {} with {} axes",
                name,
                path.display(),
                axes.len()
            );

            readers.push(tokio::spawn(forward_button_edges(
                stream,
                path.display().to_string(),
                tx.clone(),
            )));
            devices.push(InputDevice {
                name,
                path,
                device,
                axes,
            });
        }

        if devices.is_empty() {
            return Err(SharedJoystickError::DeviceNotFound);
        }

        Ok(Self {
            devices,
            edges,
            readers,
        })
    }

    fn device(&self, id: DeviceId) -> Result<&InputDevice> {
        self.devices
            .get(id.0)
            .ok_or_else(|| SharedJoystickError::Device(format!("Unknown device {}", id.0)))
    }
}

impl Drop for EvdevInputSource {
    fn drop(&mut self) {
        for reader in &self.readers {
            reader.abort();
        }
    }
}

#[async_trait]
impl DeviceInputSource for EvdevInputSource {
    fn devices(&self) -> Vec<DeviceInfo> {
        self.devices
            .iter()
            .enumerate()
            .map(|(i, device)| DeviceInfo {
                id: DeviceId(i),
                name: device.name.clone(),
                axis_count: device.axes.len(),
            })
            .collect()
    }

    fn axis_value(&mut self, axis: AxisRef) -> Result<f32> {
        let device = self.device(axis.device)?;
        device
            .read_axes()?
            .get(axis.axis)
            .copied()
            .ok_or_else(|| SharedJoystickError::Device(format!("Unknown {}", axis)))
    }

    async fn next_button_edge(&mut self) -> Result<ButtonEdge> {
        self.edges
            .recv()
            .await
            .ok_or_else(|| SharedJoystickError::Device("All input devices disconnected".to_string()))
    }

    fn snapshot(&mut self) -> Result<AxisSnapshot> {
        // One state read per device instead of one per axis
        let devices = self
            .devices
            .iter()
            .enumerate()
            .map(|(i, device)| Ok((DeviceId(i), device.read_axes()?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(AxisSnapshot { devices })
    }
}

async fn forward_button_edges(mut stream: EventStream, path: String, tx: mpsc::Sender<ButtonEdge>) {
    loop {
        match stream.next_event().await {
            Ok(event) => {
                if let Some(edge) = button_edge(&event) {
                    if tx.send(edge).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!("Stopped reading {}: {}", path, e);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::Key;

    #[test]
    fn test_scale_abs_full_range() {
        assert_eq!(scale_abs(0, 0, 1023), -1.0);
        assert_eq!(scale_abs(1023, 0, 1023), 1.0);
        assert!((scale_abs(512, 0, 1024)).abs() < 1e-6);
    }

    #[test]
    fn test_scale_abs_signed_range() {
        assert_eq!(scale_abs(-32768, -32768, 32767), -1.0);
        assert_eq!(scale_abs(32767, -32768, 32767), 1.0);
    }

    #[test]
    fn test_scale_abs_degenerate_range() {
        assert_eq!(scale_abs(5, 10, 10), 0.0);
        assert_eq!(scale_abs(5, 10, 0), 0.0);
    }

    #[test]
    fn test_button_edge_from_key_events() {
        let press = InputEvent::new(EventType::KEY, Key::BTN_SOUTH.code(), 1);
        let release = InputEvent::new(EventType::KEY, Key::BTN_SOUTH.code(), 0);
        let repeat = InputEvent::new(EventType::KEY, Key::BTN_SOUTH.code(), 2);

        assert_eq!(button_edge(&press), Some(ButtonEdge::Pressed));
        assert_eq!(button_edge(&release), Some(ButtonEdge::Released));
        assert_eq!(button_edge(&repeat), None);
    }

    #[test]
    fn test_button_edge_ignores_axis_events() {
        let event = InputEvent::new(EventType::ABSOLUTE, AbsoluteAxisType::ABS_X.0, 1);
        assert_eq!(button_edge(&event), None);
    }

    #[tokio::test]
    async fn test_open_missing_directory() {
        let result = EvdevInputSource::open_dir(Path::new("/nonexistent/input"));
        assert!(matches!(result, Err(SharedJoystickError::Device(_))));
    }

    #[tokio::test]
    async fn test_open_directory_without_devices() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("event0"), b"").unwrap();

        let result = EvdevInputSource::open_dir(dir.path());
        assert!(matches!(result, Err(SharedJoystickError::DeviceNotFound)));
    }

    #[tokio::test]
    #[ignore] // Requires connected hardware
    async fn test_open_real_devices() {
        let mut source = EvdevInputSource::open().unwrap();
        let snapshot = source.snapshot().unwrap();
        for (_, value) in snapshot.iter() {
            assert!((-1.0..=1.0).contains(&value));
        }
    }
}
