//! # Axis Calibrator
//!
//! Runs the interactive calibration procedures against a live
//! [`DeviceInputSource`], feeding ticks and button edges into a
//! [`CalibrationMachine`] and turning the finished sweeps into calibration
//! parameters.
//!
//! The operator never selects an axis: whichever axis moves the most during a
//! sweep is the one being calibrated.

use serde::Deserialize;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::machine::{CalibrationMachine, MachineState};
use super::normalizer::{BidirectionalCalibration, UnidirectionalCalibration};
use super::profile::CalibrationProfile;
use crate::console::Prompter;
use crate::device::DeviceInputSource;
use crate::error::{Result, SharedJoystickError};
use crate::shutdown::Shutdown;

/// What to do when the two steering sweeps moved different axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Fail the step so the operator repeats it
    #[default]
    Retry,
    /// Warn and trust the second sweep
    Proceed,
}

/// Calibrator settings.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationSettings {
    /// Period of the axis sampling tick during sweeps
    pub sample_interval: Duration,
    pub mismatch_policy: MismatchPolicy,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(1),
            mismatch_policy: MismatchPolicy::Retry,
        }
    }
}

/// Operator instructions for a pedal-like axis.
#[derive(Debug, Clone, Copy)]
pub struct UnidirectionalPrompts {
    pub rest: &'static str,
    pub full: &'static str,
}

/// Operator instructions for a steering-like axis.
#[derive(Debug, Clone, Copy)]
pub struct BidirectionalPrompts {
    pub center: &'static str,
    pub direction1: &'static str,
    pub direction2: &'static str,
}

pub const STEER_PROMPTS: BidirectionalPrompts = BidirectionalPrompts {
    center: "Center the wheel then press a button.",
    direction1: "Turn the wheel fully left, then return to center, then press a button.",
    direction2: "Turn the wheel fully right, then return to center, then press a button.",
};

pub const THROTTLE_PROMPTS: UnidirectionalPrompts = UnidirectionalPrompts {
    rest: "Release the throttle then press a button.",
    full: "Press the throttle fully, then press a button.",
};

pub const BRAKE_PROMPTS: UnidirectionalPrompts = UnidirectionalPrompts {
    rest: "Release the brake then press a button.",
    full: "Press the brake fully, then press a button.",
};

/// Interactive calibrator over an input source and an operator channel.
pub struct Calibrator<'a, S: DeviceInputSource + ?Sized, P: Prompter + ?Sized> {
    source: &'a mut S,
    prompter: &'a mut P,
    shutdown: Shutdown,
    settings: CalibrationSettings,
}

impl<'a, S, P> Calibrator<'a, S, P>
where
    S: DeviceInputSource + ?Sized,
    P: Prompter + ?Sized,
{
    pub fn new(
        source: &'a mut S,
        prompter: &'a mut P,
        shutdown: Shutdown,
        settings: CalibrationSettings,
    ) -> Self {
        Self {
            source,
            prompter,
            shutdown,
            settings,
        }
    }

    /// Calibrates a pedal-like axis: rest gate, then one sweep to full travel.
    ///
    /// # Errors
    ///
    /// - `NoMovementDetected` if nothing moved during the sweep
    /// - `Cancelled` if shutdown was requested
    /// - Device errors from the input source
    pub async fn calibrate_unidirectional(
        &mut self,
        prompts: &UnidirectionalPrompts,
    ) -> Result<UnidirectionalCalibration> {
        let mut machine = CalibrationMachine::unidirectional();
        self.run(&mut machine, &[prompts.rest, prompts.full]).await?;

        let detected = machine
            .sweeps()
            .first()
            .ok_or(SharedJoystickError::NoMovementDetected)?
            .detect()?;

        debug!(
            "Detected {} rest {} full {}",
            detected.axis, detected.start, detected.full
        );
        Ok(UnidirectionalCalibration::new(
            detected.axis,
            detected.start,
            detected.full,
        ))
    }

    /// Calibrates a steering-like axis: center gate, then one sweep per direction.
    ///
    /// The center is the start value of the first sweep.
    ///
    /// # Errors
    ///
    /// - `NoMovementDetected` if either sweep saw no movement
    /// - `CalibrationMismatch` if the sweeps moved different axes and the policy is `Retry`
    /// - `DirectionsNotOpposed` if both extremes are on the same side of center
    /// - `Cancelled` if shutdown was requested
    pub async fn calibrate_bidirectional(
        &mut self,
        prompts: &BidirectionalPrompts,
    ) -> Result<BidirectionalCalibration> {
        let mut machine = CalibrationMachine::bidirectional();
        self.run(
            &mut machine,
            &[prompts.center, prompts.direction1, prompts.direction2],
        )
        .await?;

        let (first_sweep, second_sweep) = match machine.sweeps() {
            [first, second] => (first, second),
            _ => return Err(SharedJoystickError::NoMovementDetected),
        };
        let first = first_sweep.detect()?;
        let second = second_sweep.detect()?;

        let axis = if first.axis == second.axis {
            first.axis
        } else {
            match self.settings.mismatch_policy {
                MismatchPolicy::Retry => {
                    return Err(SharedJoystickError::CalibrationMismatch {
                        first: first.axis,
                        second: second.axis,
                    })
                }
                MismatchPolicy::Proceed => {
                    warn!(
                        "First sweep moved {} but second sweep moved {}, using {}",
                        first.axis, second.axis, second.axis
                    );
                    self.prompter
                        .show("It seems you've selected a different axis.");
                    second.axis
                }
            }
        };

        let direction1 = first_sweep.resolve(axis)?;
        debug!(
            "Detected {} center {} direction 1 {} direction 2 {}",
            axis, direction1.start, direction1.full, second.full
        );
        BidirectionalCalibration::new(axis, direction1.start, direction1.full, second.full)
    }

    /// Calibrates steering, throttle and brake in that order.
    ///
    /// Retryable failures are reported to the operator and the failing axis is
    /// repeated until it succeeds.
    ///
    /// # Errors
    ///
    /// `Cancelled` and device errors end the calibration.
    pub async fn calibrate_controls(&mut self) -> Result<CalibrationProfile> {
        let steer = loop {
            match self.calibrate_bidirectional(&STEER_PROMPTS).await {
                Err(e) if e.is_retryable_calibration() => self.report_retry("steering", &e),
                other => break other?,
            }
        };
        let throttle = loop {
            match self.calibrate_unidirectional(&THROTTLE_PROMPTS).await {
                Err(e) if e.is_retryable_calibration() => self.report_retry("throttle", &e),
                other => break other?,
            }
        };
        let brake = loop {
            match self.calibrate_unidirectional(&BRAKE_PROMPTS).await {
                Err(e) if e.is_retryable_calibration() => self.report_retry("brake", &e),
                other => break other?,
            }
        };

        let device_names = self.source.devices().into_iter().map(|d| d.name).collect();
        Ok(CalibrationProfile::new(device_names, steer, throttle, brake))
    }

    fn report_retry(&mut self, control: &str, error: &SharedJoystickError) {
        warn!("Calibration of {} failed: {}", control, error);
        self.prompter.show(&format!(
            "Calibration of {} failed: {}. Let's try that again.",
            control, error
        ));
    }

    /// Feeds ticks and button edges into the machine until it is done.
    async fn run(&mut self, machine: &mut CalibrationMachine, prompts: &[&str]) -> Result<()> {
        let Self {
            source,
            prompter,
            shutdown,
            settings,
        } = self;

        let mut ticker = interval(settings.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut announced = None;

        loop {
            let step = machine.step_index();
            if announced != Some(step) {
                if let Some(prompt) = prompts.get(step) {
                    prompter.show(prompt);
                }
                announced = Some(step);
            }

            let state = machine.state();
            match state {
                MachineState::Done => return Ok(()),
                MachineState::Sampling if !machine.has_started_sweep() => {
                    machine.on_tick(&source.snapshot()?);
                }
                _ => {}
            }

            let edge = tokio::select! {
                biased;
                _ = shutdown.triggered() => return Err(SharedJoystickError::Cancelled),
                _ = ticker.tick(), if state == MachineState::Sampling => None,
                edge = source.next_button_edge() => Some(edge?),
            };

            match edge {
                Some(edge) => {
                    if machine.on_button(edge) {
                        info!("Calibration step {} complete", step + 1);
                    }
                }
                None => machine.on_tick(&source.snapshot()?),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::normalizer::Normalize;
    use crate::device::mocks::{RecordingPrompter, ScriptedEdge, ScriptedInputSource};
    use crate::device::{AxisRef, DeviceId};

    fn fast_settings(policy: MismatchPolicy) -> CalibrationSettings {
        CalibrationSettings {
            sample_interval: Duration::from_millis(1),
            mismatch_policy: policy,
        }
    }

    /// Gate, then a sweep where the axes hold `moved` between press and release.
    fn pedal_script(moved: Vec<Vec<f32>>, rest: Vec<Vec<f32>>) -> Vec<ScriptedEdge> {
        vec![
            ScriptedEdge::press(10),
            ScriptedEdge::release(10),
            ScriptedEdge::press(10).with_axes(moved),
            ScriptedEdge::release(10).with_axes(rest),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_unidirectional_detects_moved_axis() {
        let rest = vec![vec![0.0, -1.0, 0.3]];
        let moved = vec![vec![0.05, 1.0, 0.3]];
        let mut source = ScriptedInputSource::new(rest.clone(), pedal_script(moved, rest));
        let mut prompter = RecordingPrompter::default();
        let (_trigger, shutdown) = Shutdown::channel();

        let cal = Calibrator::new(
            &mut source,
            &mut prompter,
            shutdown,
            fast_settings(MismatchPolicy::Retry),
        )
        .calibrate_unidirectional(&THROTTLE_PROMPTS)
        .await
        .unwrap();

        assert_eq!(cal.axis, AxisRef::new(DeviceId(0), 1));
        assert_eq!(cal.zero_raw, -1.0);
        assert_eq!(cal.full_raw, 1.0);
        assert_eq!(prompter.messages, vec![THROTTLE_PROMPTS.rest, THROTTLE_PROMPTS.full]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unidirectional_inverted_pedal() {
        let rest = vec![vec![0.0], vec![1.0]];
        let moved = vec![vec![0.0], vec![-1.0]];
        let mut source = ScriptedInputSource::new(rest.clone(), pedal_script(moved, rest));
        let mut prompter = RecordingPrompter::default();
        let (_trigger, shutdown) = Shutdown::channel();

        let cal = Calibrator::new(&mut source, &mut prompter, shutdown, fast_settings(MismatchPolicy::Retry))
            .calibrate_unidirectional(&BRAKE_PROMPTS)
            .await
            .unwrap();

        assert_eq!(cal.axis, AxisRef::new(DeviceId(1), 0));
        assert_eq!(cal.zero_raw, 1.0);
        assert_eq!(cal.full_raw, -1.0);
        assert!((cal.normalize(0.0) - 0.5).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unidirectional_no_movement() {
        let rest = vec![vec![0.0, 0.5]];
        let mut source = ScriptedInputSource::new(rest.clone(), pedal_script(rest.clone(), rest));
        let mut prompter = RecordingPrompter::default();
        let (_trigger, shutdown) = Shutdown::channel();

        let result = Calibrator::new(&mut source, &mut prompter, shutdown, fast_settings(MismatchPolicy::Retry))
            .calibrate_unidirectional(&THROTTLE_PROMPTS)
            .await;

        assert!(matches!(result, Err(SharedJoystickError::NoMovementDetected)));
    }

    fn steer_script(left: Vec<Vec<f32>>, right: Vec<Vec<f32>>, center: Vec<Vec<f32>>) -> Vec<ScriptedEdge> {
        vec![
            ScriptedEdge::press(10),
            ScriptedEdge::release(10),
            ScriptedEdge::press(10).with_axes(left),
            ScriptedEdge::release(10).with_axes(center.clone()),
            ScriptedEdge::press(10).with_axes(right),
            ScriptedEdge::release(10).with_axes(center),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_bidirectional_calibration() {
        let center = vec![vec![0.5, 0.0]];
        let script = steer_script(vec![vec![0.5, -0.9]], vec![vec![0.5, 0.8]], center.clone());
        let mut source = ScriptedInputSource::new(center, script);
        let mut prompter = RecordingPrompter::default();
        let (_trigger, shutdown) = Shutdown::channel();

        let cal = Calibrator::new(&mut source, &mut prompter, shutdown, fast_settings(MismatchPolicy::Retry))
            .calibrate_bidirectional(&STEER_PROMPTS)
            .await
            .unwrap();

        assert_eq!(cal.axis, AxisRef::new(DeviceId(0), 1));
        assert_eq!(cal.center_raw, 0.0);
        assert_eq!(cal.direction1_full_raw, -0.9);
        assert_eq!(cal.direction2_full_raw, 0.8);
        assert_eq!(prompter.messages.len(), 3);
        assert!(cal.normalize(-0.45) < 0.0);
        assert!(cal.normalize(0.4) > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bidirectional_mismatch_fails_with_retry_policy() {
        let center = vec![vec![0.0, 0.0]];
        let script = steer_script(vec![vec![-1.0, 0.0]], vec![vec![0.0, 1.0]], center.clone());
        let mut source = ScriptedInputSource::new(center, script);
        let mut prompter = RecordingPrompter::default();
        let (_trigger, shutdown) = Shutdown::channel();

        let result = Calibrator::new(&mut source, &mut prompter, shutdown, fast_settings(MismatchPolicy::Retry))
            .calibrate_bidirectional(&STEER_PROMPTS)
            .await;

        match result {
            Err(SharedJoystickError::CalibrationMismatch { first, second }) => {
                assert_eq!(first, AxisRef::new(DeviceId(0), 0));
                assert_eq!(second, AxisRef::new(DeviceId(0), 1));
            }
            other => panic!("Expected CalibrationMismatch, got: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bidirectional_mismatch_proceeds_with_second_axis() {
        let center = vec![vec![0.0, 0.0]];
        // Axis 1 moves a little in the first sweep, a lot in the second
        let script = steer_script(vec![vec![-1.0, -0.2]], vec![vec![0.0, 1.0]], center.clone());
        let mut source = ScriptedInputSource::new(center, script);
        let mut prompter = RecordingPrompter::default();
        let (_trigger, shutdown) = Shutdown::channel();

        let cal = Calibrator::new(&mut source, &mut prompter, shutdown, fast_settings(MismatchPolicy::Proceed))
            .calibrate_bidirectional(&STEER_PROMPTS)
            .await
            .unwrap();

        assert_eq!(cal.axis, AxisRef::new(DeviceId(0), 1));
        assert_eq!(cal.direction1_full_raw, -0.2);
        assert_eq!(cal.direction2_full_raw, 1.0);
        assert!(prompter.messages.iter().any(|m| m.contains("different axis")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bidirectional_same_direction_rejected() {
        let center = vec![vec![0.0]];
        let script = steer_script(vec![vec![-1.0]], vec![vec![-0.9]], center.clone());
        let mut source = ScriptedInputSource::new(center, script);
        let mut prompter = RecordingPrompter::default();
        let (_trigger, shutdown) = Shutdown::channel();

        let result = Calibrator::new(&mut source, &mut prompter, shutdown, fast_settings(MismatchPolicy::Retry))
            .calibrate_bidirectional(&STEER_PROMPTS)
            .await;

        assert!(matches!(result, Err(SharedJoystickError::DirectionsNotOpposed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_calibrate_controls_retries_failed_axis() {
        let rest = vec![vec![0.0, -1.0, -1.0]];
        let mut script = steer_script(vec![vec![-1.0, -1.0, -1.0]], vec![vec![1.0, -1.0, -1.0]], rest.clone());
        // First throttle attempt: nothing moves
        script.extend(pedal_script(rest.clone(), rest.clone()));
        script.extend(pedal_script(vec![vec![0.0, 1.0, -1.0]], rest.clone()));
        script.extend(pedal_script(vec![vec![0.0, -1.0, 0.6]], rest.clone()));

        let mut source = ScriptedInputSource::new(rest, script);
        let mut prompter = RecordingPrompter::default();
        let (_trigger, shutdown) = Shutdown::channel();

        let profile = Calibrator::new(&mut source, &mut prompter, shutdown, fast_settings(MismatchPolicy::Retry))
            .calibrate_controls()
            .await
            .unwrap();

        assert_eq!(profile.steer.axis, AxisRef::new(DeviceId(0), 0));
        assert_eq!(profile.throttle.axis, AxisRef::new(DeviceId(0), 1));
        assert_eq!(profile.brake.axis, AxisRef::new(DeviceId(0), 2));
        assert_eq!(profile.brake.full_raw, 0.6);
        assert_eq!(profile.devices, vec!["Scripted Device 0".to_string()]);
        assert!(prompter
            .messages
            .iter()
            .any(|m| m.starts_with("Calibration of throttle failed")));
        assert_eq!(source.remaining_edges(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_waiting_calibration() {
        let mut source = ScriptedInputSource::new(vec![vec![0.0]], vec![]);
        let mut prompter = RecordingPrompter::default();
        let (trigger, shutdown) = Shutdown::channel();
        trigger.trigger();

        let result = Calibrator::new(&mut source, &mut prompter, shutdown, fast_settings(MismatchPolicy::Retry))
            .calibrate_unidirectional(&THROTTLE_PROMPTS)
            .await;

        assert!(matches!(result, Err(SharedJoystickError::Cancelled)));
    }
}
