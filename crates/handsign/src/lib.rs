//! Hand landmark detection driver and geometric gesture classification.
//!
//! The crate has two halves:
//!
//! - [`landmarker::HandLandmarker`] drives an opaque landmark inference engine (anything
//!   implementing [`engine::LandmarkEngine`]) in one of three [`engine::RunningMode`]s: single
//!   images, offline videos, and live camera streams. It measures inference latency and packages
//!   everything into [`bundle::ResultBundle`]s.
//! - [`gesture::classify`] turns a closed hand [`geometry::Contour`] into a [`gesture::Gesture`]
//!   label using nothing but polygon area and convexity-defect counts.
//!
//! [`session::GestureSession`] connects both: it derives contours from the landmarks in a result
//! bundle and classifies every detected hand.
//!
//! # Coordinates
//!
//! Landmarks use normalized image coordinates: X and Y are in range 0.0 to 1.0, with X pointing to
//! the right and Y pointing *down*. Contours handed to the classifier are expected to be in pixel
//! units, since its thresholds are expressed in square pixels.
//!
//! # Environment Variables
//!
//! [`engine::EngineSettings::from_env`] reads the following variables:
//!
//! * `HANDSIGN_DELEGATE`: hardware backend to run the model on, `cpu` or `gpu`.
//! * `HANDSIGN_NUM_HANDS`: maximum number of hands to detect (at least 1).
//! * `HANDSIGN_MIN_DETECTION_CONFIDENCE`, `HANDSIGN_MIN_TRACKING_CONFIDENCE`,
//!   `HANDSIGN_MIN_PRESENCE_CONFIDENCE`: confidence thresholds in range 0.0 to 1.0.

use log::LevelFilter;

pub mod bundle;
pub mod engine;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod gesture;
pub mod landmark;
pub mod landmarker;
pub mod listener;
pub mod resolution;
pub mod session;
pub mod timer;
mod worker;


pub use error::{Error, ErrorCode, Result};

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and `handsign` will log at *debug* level. `RUST_LOG` can be used to override
/// this.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
