//! # Calibration State Machine
//!
//! Drives one calibration procedure from two kinds of input:
//!
//! - a periodic **tick** carrying a snapshot of every axis
//! - discrete **button edges** (press, release)
//!
//! A procedure is a list of steps. A *gate* step only waits for a press followed
//! by a release. A *sweep* step records every axis on its first tick, tracks
//! extremes on every following tick, and ends on press + release.
//!
//! ```text
//!  unidirectional:  Gate(rest) -> Sweep(full)              -> Done
//!  bidirectional:   Gate(center) -> Sweep(dir 1) -> Sweep(dir 2) -> Done
//! ```

use tracing::trace;

use super::detector::ExtremesTracker;
use crate::device::{AxisSnapshot, ButtonEdge};

/// Kind of a procedure step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Wait for press + release, ignore axes
    Gate,
    /// Track every axis until press + release
    Sweep,
}

/// Observable state of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    AwaitGate,
    Sampling,
    Done,
}

/// Calibration procedure state machine.
///
/// # Examples
///
/// ```
/// use shared_joystick::calibration::machine::{CalibrationMachine, MachineState};
/// use shared_joystick::device::ButtonEdge;
///
/// let mut machine = CalibrationMachine::unidirectional();
/// assert_eq!(machine.state(), MachineState::AwaitGate);
///
/// machine.on_button(ButtonEdge::Pressed);
/// machine.on_button(ButtonEdge::Released);
/// assert_eq!(machine.state(), MachineState::Sampling);
/// ```
#[derive(Debug, Clone)]
pub struct CalibrationMachine {
    steps: Vec<StepKind>,
    step: usize,
    pressed: bool,
    current: Option<ExtremesTracker>,
    sweeps: Vec<ExtremesTracker>,
}

impl CalibrationMachine {
    #[must_use]
    pub fn new(steps: Vec<StepKind>) -> Self {
        Self {
            steps,
            step: 0,
            pressed: false,
            current: None,
            sweeps: Vec::new(),
        }
    }

    /// Rest gate followed by one sweep (throttle, brake).
    #[must_use]
    pub fn unidirectional() -> Self {
        Self::new(vec![StepKind::Gate, StepKind::Sweep])
    }

    /// Center gate followed by one sweep per direction (steering).
    #[must_use]
    pub fn bidirectional() -> Self {
        Self::new(vec![StepKind::Gate, StepKind::Sweep, StepKind::Sweep])
    }

    #[must_use]
    pub fn state(&self) -> MachineState {
        match self.steps.get(self.step) {
            Some(StepKind::Gate) => MachineState::AwaitGate,
            Some(StepKind::Sweep) => MachineState::Sampling,
            None => MachineState::Done,
        }
    }

    /// Index of the current step (equals the step count once done).
    #[must_use]
    pub fn step_index(&self) -> usize {
        self.step
    }

    /// Whether the current sweep has recorded its start values.
    #[must_use]
    pub fn has_started_sweep(&self) -> bool {
        self.current.is_some()
    }

    /// Feeds an axis snapshot. Ignored outside of sweeps.
    pub fn on_tick(&mut self, snapshot: &AxisSnapshot) {
        if self.state() != MachineState::Sampling {
            return;
        }
        match &mut self.current {
            Some(tracker) => tracker.observe(snapshot),
            None => {
                trace!("Recording sweep start values for step {}", self.step);
                self.current = Some(ExtremesTracker::start(snapshot));
            }
        }
    }

    /// Feeds a button edge.
    ///
    /// Returns `true` when the edge completed the current step.
    pub fn on_button(&mut self, edge: ButtonEdge) -> bool {
        if self.state() == MachineState::Done {
            return false;
        }
        match edge {
            ButtonEdge::Pressed => {
                self.pressed = true;
                false
            }
            // A release without a preceding press is ignored
            ButtonEdge::Released if !self.pressed => false,
            ButtonEdge::Released => {
                self.complete_step();
                true
            }
        }
    }

    fn complete_step(&mut self) {
        if self.steps[self.step] == StepKind::Sweep {
            // A sweep ended before any tick yields an empty tracker, which
            // detection reports as no movement
            self.sweeps.push(self.current.take().unwrap_or_default());
        }
        self.pressed = false;
        self.step += 1;
        trace!("Calibration step {} complete", self.step);
    }

    /// Completed sweeps in step order.
    #[must_use]
    pub fn sweeps(&self) -> &[ExtremesTracker] {
        &self.sweeps
    }
}
