//! # Position Normalizer
//!
//! Maps raw axis readings to proportions using the parameters found by the
//! calibrator.
//!
//! ## Unidirectional axes (throttle, brake)
//!
//! `value = (raw - zero) / (full - zero)`
//!
//! 0.0 is rest, 1.0 is full travel. The sign of `full - zero` absorbs inverted
//! pedals. The result is not clamped, so slight overshoot passes through.
//!
//! ## Bidirectional axes (steering)
//!
//! A reading on the same side of center as the direction-1 extreme maps to
//! `-proportion(center, dir1, raw)`; anything else maps to
//! `+proportion(center, dir2, raw)`. Direction 1 (left) is negative and
//! direction 2 (right) is positive.

use serde::{Deserialize, Serialize};

use crate::device::AxisRef;
use crate::error::{Result, SharedJoystickError};

/// Distance along `from..to` represented by `value`, where `from` is 0.0 and
/// `to` is 1.0.
///
/// # Examples
///
/// ```
/// use shared_joystick::calibration::normalizer::proportion;
///
/// assert_eq!(proportion(-1.0, 1.0, 0.0), 0.5);
/// assert_eq!(proportion(1.0, -1.0, 0.0), 0.5);
/// ```
#[must_use]
pub fn proportion(from: f32, to: f32, value: f32) -> f32 {
    (value - from) / (to - from)
}

/// Something that turns a raw reading of one axis into a proportion.
pub trait Normalize {
    /// Axis the parameters belong to.
    fn axis(&self) -> AxisRef;

    /// Proportion for a raw reading of [`Normalize::axis`].
    fn normalize(&self, raw: f32) -> f32;
}

/// Calibration of a pedal-like axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnidirectionalCalibration {
    pub axis: AxisRef,
    pub zero_raw: f32,
    pub full_raw: f32,
}

impl UnidirectionalCalibration {
    #[must_use]
    pub fn new(axis: AxisRef, zero_raw: f32, full_raw: f32) -> Self {
        Self {
            axis,
            zero_raw,
            full_raw,
        }
    }
}

impl Normalize for UnidirectionalCalibration {
    fn axis(&self) -> AxisRef {
        self.axis
    }

    fn normalize(&self, raw: f32) -> f32 {
        proportion(self.zero_raw, self.full_raw, raw)
    }
}

/// Calibration of a steering-like axis.
///
/// The offsets of both extremes from center are cached at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BidirectionalCalibration {
    pub axis: AxisRef,
    pub center_raw: f32,
    pub direction1_full_raw: f32,
    pub direction2_full_raw: f32,
    #[serde(skip)]
    offset1: f32,
    #[serde(skip)]
    offset2: f32,
}

impl BidirectionalCalibration {
    /// Builds the calibration and caches the direction offsets.
    ///
    /// # Errors
    ///
    /// Returns `DirectionsNotOpposed` if the two extremes are not on opposite
    /// sides of center.
    pub fn new(
        axis: AxisRef,
        center_raw: f32,
        direction1_full_raw: f32,
        direction2_full_raw: f32,
    ) -> Result<Self> {
        let offset1 = direction1_full_raw - center_raw;
        let offset2 = direction2_full_raw - center_raw;
        // NaN offsets are never opposed
        let opposed = offset1 * offset2 < 0.0;
        if !opposed {
            return Err(SharedJoystickError::DirectionsNotOpposed);
        }

        Ok(Self {
            axis,
            center_raw,
            direction1_full_raw,
            direction2_full_raw,
            offset1,
            offset2,
        })
    }

    /// `direction1_full_raw - center_raw`
    #[must_use]
    pub fn offset1(&self) -> f32 {
        self.offset1
    }

    /// `direction2_full_raw - center_raw`
    #[must_use]
    pub fn offset2(&self) -> f32 {
        self.offset2
    }
}

impl Normalize for BidirectionalCalibration {
    fn axis(&self) -> AxisRef {
        self.axis
    }

    fn normalize(&self, raw: f32) -> f32 {
        let delta = raw - self.center_raw;
        // Same strict side of center as the direction-1 extreme
        if delta * self.offset1 > 0.0 {
            -(delta / self.offset1)
        } else {
            delta / self.offset2
        }
    }
}

#[derive(Deserialize)]
struct StoredBidirectional {
    axis: AxisRef,
    center_raw: f32,
    direction1_full_raw: f32,
    direction2_full_raw: f32,
}

impl<'de> Deserialize<'de> for BidirectionalCalibration {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let stored = StoredBidirectional::deserialize(deserializer)?;
        Self::new(
            stored.axis,
            stored.center_raw,
            stored.direction1_full_raw,
            stored.direction2_full_raw,
        )
        .map_err(serde::de::Error::custom)
    }
}
