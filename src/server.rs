//! # Server
//!
//! Receives frames from every client, fuses each window into one state and
//! drives the output device with it.
//!
//! ```text
//! UDP datagrams -> decode -> window mean -> OutputDevice
//! ```
//!
//! Before the run loop the server can sweep the output through its full range
//! so the simulator's own controller calibration sees every extreme.

use tokio::time::{sleep, Duration};
use tracing::{debug, info};

use crate::console::Prompter;
use crate::device::{apply_state, OutputAxis, OutputDevice};
use crate::error::{Result, SharedJoystickError};
use crate::net::aggregator::Aggregator;
use crate::net::FrameReceiver;
use crate::shutdown::Shutdown;
use crate::wire::protocol::*;

/// Number of windows between status log messages
pub const LOG_INTERVAL_WINDOWS: u64 = 500;

/// One stage of the output sweep: a prompt, then a sequence of values on one axis.
#[derive(Debug, Clone, Copy)]
pub struct SweepStage {
    pub prompt: &'static str,
    pub axis: OutputAxis,
    pub values: &'static [u16],
}

pub const SWEEP_STAGES: [SweepStage; 3] = [
    SweepStage {
        prompt: "Open the simulator's steering calibration then press Enter.",
        axis: OutputAxis::Steer,
        values: &[STEER_CENTER, STEER_FULL_LEFT, STEER_FULL_RIGHT, STEER_CENTER],
    },
    SweepStage {
        prompt: "Close the steering calibration, open the pedal calibration, and press Enter.",
        axis: OutputAxis::Throttle,
        values: &[THROTTLE_IDLE, THROTTLE_OPEN, THROTTLE_IDLE],
    },
    SweepStage {
        prompt: "Advance to the brake calibration and press Enter.",
        axis: OutputAxis::Brake,
        values: &[BRAKE_RELEASED, BRAKE_APPLIED, BRAKE_RELEASED],
    },
];

pub const SWEEP_DONE_PROMPT: &str =
    "Select auto clutch and auto shift, close the calibration window, and press Enter.";

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub windows: u64,
    pub frames: u64,
    pub dropped: u64,
}

/// Drives the output to the default state and returns that state.
///
/// # Errors
///
/// Returns device errors from the output.
pub fn initialize_output<O: OutputDevice + ?Sized>(output: &mut O) -> Result<ControlState> {
    let state = ControlState::default();
    apply_state(output, &state)?;
    debug!("Output initialized to {}", state);
    Ok(state)
}

/// Sweeps every output axis through its range, waiting for the operator
/// before each stage and after the last.
///
/// Each value is held for `step` before the next one is set. `state` is left at
/// the last applied values.
///
/// # Errors
///
/// - `Cancelled` if shutdown was requested
/// - Device errors from the output
/// - `Io` if the operator console is closed
pub async fn sweep_output<O, P>(
    output: &mut O,
    prompter: &mut P,
    state: &mut ControlState,
    step: Duration,
    shutdown: &mut Shutdown,
) -> Result<()>
where
    O: OutputDevice + ?Sized,
    P: Prompter + ?Sized,
{
    for stage in &SWEEP_STAGES {
        confirm_or_cancel(prompter, stage.prompt, shutdown).await?;
        info!("Sweeping {:?} through {:?}", stage.axis, stage.values);

        for (i, &value) in stage.values.iter().enumerate() {
            if i > 0 {
                tokio::select! {
                    biased;
                    _ = shutdown.triggered() => return Err(SharedJoystickError::Cancelled),
                    _ = sleep(step) => {}
                }
            }
            match stage.axis {
                OutputAxis::Steer => state.set_steer(i64::from(value)),
                OutputAxis::Throttle => state.set_throttle(i64::from(value)),
                OutputAxis::Brake => state.set_brake(i64::from(value)),
            }
            apply_state(output, state)?;
        }
    }

    confirm_or_cancel(prompter, SWEEP_DONE_PROMPT, shutdown).await
}

async fn confirm_or_cancel<P: Prompter + ?Sized>(
    prompter: &mut P,
    message: &str,
    shutdown: &mut Shutdown,
) -> Result<()> {
    tokio::select! {
        biased;
        _ = shutdown.triggered() => Err(SharedJoystickError::Cancelled),
        confirmed = prompter.confirm(message) => confirmed,
    }
}

/// Collect, fuse and apply windows until shutdown.
///
/// # Arguments
///
/// * `receiver` - Bound listening socket
/// * `output` - Device the fused state is applied to
/// * `initial` - State kept until the first non-empty window
/// * `window` - Window length
/// * `shutdown` - Stops the loop when triggered
///
/// # Returns
///
/// * `Result<ServerStats>` - Counters for the whole run
///
/// # Errors
///
/// Returns socket errors and output device errors.
pub async fn run_server<O: OutputDevice + ?Sized>(
    receiver: &mut FrameReceiver,
    output: &mut O,
    initial: ControlState,
    window: Duration,
    mut shutdown: Shutdown,
) -> Result<ServerStats> {
    let mut aggregator = Aggregator::new(initial);
    let mut stats = ServerStats::default();
    let mut last_log = ServerStats::default();

    info!("Aggregating frames in {:?} windows", window);

    loop {
        let collected = tokio::select! {
            biased;
            _ = shutdown.triggered() => break,
            collected = receiver.collect_window(window) => collected?,
        };

        let state = *aggregator.apply(&collected);
        apply_state(output, &state)?;

        stats.windows += 1;
        stats.frames += collected.frame_count();
        stats.dropped += collected.dropped_count();

        if stats.windows - last_log.windows >= LOG_INTERVAL_WINDOWS {
            info!(
                "{} windows: {} frames, {} dropped, {} senders in last window, output {}",
                stats.windows - last_log.windows,
                stats.frames - last_log.frames,
                stats.dropped - last_log.dropped,
                collected.sender_count(),
                state
            );
            last_log = stats;
        }
    }

    info!(
        "Processed {} windows, {} frames, {} dropped",
        stats.windows, stats.frames, stats.dropped
    );
    Ok(stats)
}
