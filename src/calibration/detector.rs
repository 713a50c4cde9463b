//! # Axis Detector
//!
//! Finds which axis the operator moved during a sweep, and in which direction,
//! without asking them to pick an axis.
//!
//! Every axis of every device is tracked during a sweep. The axis with the
//! largest `max - min` range wins; its "full" position is whichever extreme lies
//! further from where the axis started.

use std::collections::BTreeMap;

use crate::device::{AxisRef, AxisSnapshot};
use crate::error::{Result, SharedJoystickError};

/// Start value and observed extremes of one axis during a sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisExtremes {
    pub start: f32,
    pub min: f32,
    pub max: f32,
}

impl AxisExtremes {
    #[must_use]
    pub fn new(start: f32) -> Self {
        Self {
            start,
            min: start,
            max: start,
        }
    }

    pub fn observe(&mut self, value: f32) {
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    /// Range of motion seen during the sweep.
    #[must_use]
    pub fn range(&self) -> f32 {
        (self.max - self.min).abs()
    }

    /// The extreme furthest from the start value.
    ///
    /// Ties go to `min`.
    #[must_use]
    pub fn full(&self) -> f32 {
        if (self.max - self.start).abs() > (self.min - self.start).abs() {
            self.max
        } else {
            self.min
        }
    }
}

/// Axis picked by a sweep, with its rest and full positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedAxis {
    pub axis: AxisRef,
    pub start: f32,
    pub full: f32,
}

/// Running extremes for every axis of every device during one sweep.
#[derive(Debug, Clone, Default)]
pub struct ExtremesTracker {
    axes: BTreeMap<AxisRef, AxisExtremes>,
}

impl ExtremesTracker {
    /// Starts tracking with the first snapshot as every axis' start value.
    #[must_use]
    pub fn start(snapshot: &AxisSnapshot) -> Self {
        Self {
            axes: snapshot
                .iter()
                .map(|(axis, value)| (axis, AxisExtremes::new(value)))
                .collect(),
        }
    }

    /// Folds a later snapshot into the extremes.
    ///
    /// Axes that were not present at the start are started now.
    pub fn observe(&mut self, snapshot: &AxisSnapshot) {
        for (axis, value) in snapshot.iter() {
            self.axes
                .entry(axis)
                .and_modify(|extremes| extremes.observe(value))
                .or_insert_with(|| AxisExtremes::new(value));
        }
    }

    #[must_use]
    pub fn get(&self, axis: AxisRef) -> Option<&AxisExtremes> {
        self.axes.get(&axis)
    }

    pub fn insert(&mut self, axis: AxisRef, extremes: AxisExtremes) {
        self.axes.insert(axis, extremes);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Picks the axis with the largest range of motion.
    ///
    /// On equal ranges the first axis in enumeration order wins.
    ///
    /// # Errors
    ///
    /// Returns `NoMovementDetected` if no axis moved at all.
    pub fn detect(&self) -> Result<DetectedAxis> {
        let mut best: Option<(AxisRef, &AxisExtremes)> = None;
        for (axis, extremes) in &self.axes {
            let better = match best {
                Some((_, current)) => extremes.range() > current.range(),
                None => extremes.range() > 0.0,
            };
            if better {
                best = Some((*axis, extremes));
            }
        }

        let (axis, _) = best.ok_or(SharedJoystickError::NoMovementDetected)?;
        self.resolve(axis)
    }

    /// Start and full positions of a specific axis.
    ///
    /// # Errors
    ///
    /// Returns `NoMovementDetected` if the axis was not tracked or did not move.
    pub fn resolve(&self, axis: AxisRef) -> Result<DetectedAxis> {
        let extremes = self
            .axes
            .get(&axis)
            .filter(|extremes| extremes.range() > 0.0)
            .ok_or(SharedJoystickError::NoMovementDetected)?;

        Ok(DetectedAxis {
            axis,
            start: extremes.start,
            full: extremes.full(),
        })
    }
}
