//! # Calibration Module
//!
//! Interactive axis calibration and position normalization.
//!
//! This module handles:
//! - Tracking per-axis extremes and picking the moved axis ([`detector`])
//! - The gate/sweep procedure state machine ([`machine`])
//! - Turning raw readings into proportions ([`normalizer`])
//! - Driving the procedures against a live input source ([`calibrator`])
//! - Persisting a finished calibration ([`profile`])

pub mod calibrator;
pub mod detector;
pub mod machine;
pub mod normalizer;
pub mod profile;

pub use calibrator::{
    CalibrationSettings, Calibrator, MismatchPolicy, BRAKE_PROMPTS, STEER_PROMPTS,
    THROTTLE_PROMPTS,
};
pub use normalizer::{BidirectionalCalibration, Normalize, UnidirectionalCalibration};
pub use profile::CalibrationProfile;
