//! # Client
//!
//! Calibrates the local devices, then streams the normalized control state to
//! the server:
//!
//! ```text
//! sample axes -> normalize -> ControlState -> encode -> UDP datagram
//! ```
//!
//! Frames are sent as fast as possible unless a send interval is configured.

use bytes::BytesMut;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::calibration::{CalibrationProfile, Calibrator};
use crate::config::CalibrationConfig;
use crate::console::Prompter;
use crate::device::DeviceInputSource;
use crate::error::Result;
use crate::net::FrameSender;
use crate::shutdown::Shutdown;
use crate::wire::encoder::encode_frame_into;
use crate::wire::protocol::{ControlState, FRAME_LEN};

/// Number of frames between status log messages
pub const LOG_INTERVAL_FRAMES: u64 = 10_000;

/// Returns the saved calibration if it matches the connected devices, otherwise
/// calibrates interactively and saves the result.
///
/// The calibration summary is shown to the operator either way.
///
/// # Errors
///
/// - `Cancelled` if shutdown was requested during calibration
/// - Device errors from the input source
pub async fn obtain_profile<S, P>(
    source: &mut S,
    prompter: &mut P,
    shutdown: Shutdown,
    config: &CalibrationConfig,
) -> Result<CalibrationProfile>
where
    S: DeviceInputSource + ?Sized,
    P: Prompter + ?Sized,
{
    let path = config.profile_path();

    let saved = match &path {
        Some(path) => match CalibrationProfile::load(path) {
            Ok(profile) if profile.matches_devices(&source.devices()) => {
                info!("Using saved calibration from {}", profile.created_at);
                Some(profile)
            }
            Ok(_) => {
                info!("Saved calibration was made with different devices, recalibrating");
                None
            }
            Err(e) => {
                debug!("No usable calibration at {}: {}", path.display(), e);
                None
            }
        },
        None => None,
    };

    let profile = match saved {
        Some(profile) => profile,
        None => {
            let profile = Calibrator::new(source, prompter, shutdown, config.settings())
                .calibrate_controls()
                .await?;
            if let Some(path) = &path {
                if let Err(e) = profile.save(path) {
                    warn!("Failed to save calibration to {}: {}", path.display(), e);
                }
            }
            profile
        }
    };

    for line in profile.summary() {
        prompter.show(&line);
    }
    Ok(profile)
}

/// Sample, encode and send frames until shutdown.
///
/// # Arguments
///
/// * `source` - Input devices the profile was made with
/// * `profile` - Calibration used to normalize every sample
/// * `sender` - Destination socket
/// * `send_interval` - Delay between frames, `None` for uncapped
/// * `shutdown` - Stops the loop when triggered
///
/// # Returns
///
/// * `Result<u64>` - Number of frames sent
///
/// # Errors
///
/// Returns device errors from sampling and `Io` on the first failed send.
pub async fn run_client<S: DeviceInputSource + ?Sized>(
    source: &mut S,
    profile: &CalibrationProfile,
    sender: &FrameSender,
    send_interval: Option<Duration>,
    mut shutdown: Shutdown,
) -> Result<u64> {
    let mut ticker = send_interval.map(|period| {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });

    let mut state = ControlState::default();
    let mut frame = BytesMut::with_capacity(FRAME_LEN);
    let mut frame_count: u64 = 0;

    match send_interval {
        Some(period) => info!("Sending frames to {} every {:?}", sender.target(), period),
        None => info!("Sending frames to {} as fast as possible", sender.target()),
    }

    loop {
        match ticker.as_mut() {
            Some(ticker) => {
                tokio::select! {
                    biased;
                    _ = shutdown.triggered() => break,
                    _ = ticker.tick() => {}
                }
            }
            None => {
                if shutdown.is_triggered() {
                    break;
                }
                // Let the runtime breathe between back-to-back frames
                tokio::task::yield_now().await;
            }
        }

        profile.sample(source, &mut state)?;
        frame.clear();
        encode_frame_into(&state, &mut frame);

        if let Err(e) = sender.send(&frame).await {
            warn!("Failed to send frame to {}: {}", sender.target(), e);
            return Err(e);
        }

        frame_count += 1;
        if frame_count % LOG_INTERVAL_FRAMES == 0 {
            info!("Sent {} frames, current state {}", frame_count, state);
        }
    }

    info!("Total frames sent: {}", frame_count);
    Ok(frame_count)
}
