//! # Calibration Profile
//!
//! The result of a full calibration, persisted as JSON so the operator can skip
//! calibration when the same devices are connected again.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::normalizer::{BidirectionalCalibration, Normalize, UnidirectionalCalibration};
use crate::device::{AxisRef, DeviceInfo, DeviceInputSource};
use crate::error::Result;
use crate::wire::protocol::ControlState;

/// Calibration of all three controls plus the device set it was made with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub created_at: DateTime<Utc>,
    /// Device names in enumeration order
    pub devices: Vec<String>,
    pub steer: BidirectionalCalibration,
    pub throttle: UnidirectionalCalibration,
    pub brake: UnidirectionalCalibration,
}

impl CalibrationProfile {
    #[must_use]
    pub fn new(
        devices: Vec<String>,
        steer: BidirectionalCalibration,
        throttle: UnidirectionalCalibration,
        brake: UnidirectionalCalibration,
    ) -> Self {
        Self {
            created_at: Utc::now(),
            devices,
            steer,
            throttle,
            brake,
        }
    }

    /// Load a profile from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid profile.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let profile: Self = serde_json::from_str(&contents)?;
        debug!("Loaded calibration profile from {}", path.as_ref().display());
        Ok(profile)
    }

    /// Save the profile as pretty-printed JSON, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Saved calibration profile to {}", path.display());
        Ok(())
    }

    /// Whether the profile was made with exactly this device set and every
    /// calibrated axis still exists.
    #[must_use]
    pub fn matches_devices(&self, devices: &[DeviceInfo]) -> bool {
        let same_names = self.devices.len() == devices.len()
            && self
                .devices
                .iter()
                .zip(devices)
                .all(|(name, info)| *name == info.name);

        same_names
            && [self.steer.axis, self.throttle.axis, self.brake.axis]
                .iter()
                .all(|axis| {
                    devices
                        .get(axis.device.0)
                        .is_some_and(|info| axis.axis < info.axis_count)
                })
    }

    /// Samples the three calibrated axes and writes the normalized positions
    /// into `state`.
    ///
    /// # Errors
    ///
    /// Returns device errors from the input source.
    pub fn sample<S: DeviceInputSource + ?Sized>(
        &self,
        source: &mut S,
        state: &mut ControlState,
    ) -> Result<()> {
        state.set_steer_from_float(self.steer.normalize(source.axis_value(self.steer.axis)?));
        state.set_throttle_from_float(
            self.throttle
                .normalize(source.axis_value(self.throttle.axis)?),
        );
        state.set_brake_from_float(self.brake.normalize(source.axis_value(self.brake.axis)?));
        Ok(())
    }

    /// One line per control describing the calibrated axis and its range.
    #[must_use]
    pub fn summary(&self) -> Vec<String> {
        vec![
            format!(
                "Steer axis is {} range {} - {} - {}",
                self.axis_label(self.steer.axis),
                self.steer.direction1_full_raw,
                self.steer.center_raw,
                self.steer.direction2_full_raw
            ),
            format!(
                "Throttle axis is {} range {} - {}",
                self.axis_label(self.throttle.axis),
                self.throttle.zero_raw,
                self.throttle.full_raw
            ),
            format!(
                "Brake axis is {} range {} - {}",
                self.axis_label(self.brake.axis),
                self.brake.zero_raw,
                self.brake.full_raw
            ),
        ]
    }

    fn axis_label(&self, axis: AxisRef) -> String {
        match self.devices.get(axis.device.0) {
            Some(name) => format!("{}:{}", name, axis.axis),
            None => axis.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mocks::ScriptedInputSource;
    use crate::device::DeviceId;
    use tempfile::tempdir;

    fn profile() -> CalibrationProfile {
        CalibrationProfile::new(
            vec!["Wheel".to_string(), "Pedals".to_string()],
            BidirectionalCalibration::new(AxisRef::new(DeviceId(0), 0), 0.0, -1.0, 1.0).unwrap(),
            UnidirectionalCalibration::new(AxisRef::new(DeviceId(1), 0), -1.0, 1.0),
            UnidirectionalCalibration::new(AxisRef::new(DeviceId(1), 1), 1.0, -1.0),
        )
    }

    fn devices() -> Vec<DeviceInfo> {
        vec![
            DeviceInfo {
                id: DeviceId(0),
                name: "Wheel".to_string(),
                axis_count: 1,
            },
            DeviceInfo {
                id: DeviceId(1),
                name: "Pedals".to_string(),
                axis_count: 2,
            },
        ]
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profiles").join("calibration.json");

        let original = profile();
        original.save(&path).unwrap();
        let loaded = CalibrationProfile::load(&path).unwrap();

        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        assert!(CalibrationProfile::load(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_steering() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");

        let mut value = serde_json::to_value(profile()).unwrap();
        value["steer"]["direction2_full_raw"] = serde_json::json!(-0.5);
        fs::write(&path, value.to_string()).unwrap();

        assert!(CalibrationProfile::load(&path).is_err());
    }

    #[test]
    fn test_matches_devices() {
        let profile = profile();
        assert!(profile.matches_devices(&devices()));

        let mut renamed = devices();
        renamed[1].name = "Other Pedals".to_string();
        assert!(!profile.matches_devices(&renamed));

        let mut fewer_axes = devices();
        fewer_axes[1].axis_count = 1;
        assert!(!profile.matches_devices(&fewer_axes));

        assert!(!profile.matches_devices(&devices()[..1]));
    }

    #[test]
    fn test_sample_normalizes_axes() {
        let profile = profile();
        let mut source = ScriptedInputSource::new(vec![vec![-1.0], vec![1.0, 1.0]], vec![]);
        let mut state = ControlState::default();

        profile.sample(&mut source, &mut state).unwrap();

        assert_eq!(state.steer(), 0);
        assert_eq!(state.throttle(), 65535);
        assert_eq!(state.brake(), 0);
    }

    #[test]
    fn test_summary_names_devices() {
        let summary = profile().summary();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0], "Steer axis is Wheel:0 range -1 - 0 - 1");
        assert_eq!(summary[1], "Throttle axis is Pedals:0 range -1 - 1");
        assert_eq!(summary[2], "Brake axis is Pedals:1 range 1 - -1");
    }
}
