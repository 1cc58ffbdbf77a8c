//! Error types.

use std::fmt;

use thiserror::Error;

use crate::engine::RunningMode;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by the landmark driver and the gesture classifier.
#[derive(Debug, Error)]
pub enum Error {
    /// The landmark engine could not be created from the configured options.
    #[error("hand landmarker failed to initialize ({kind}): {message}")]
    EngineInit {
        kind: InitErrorKind,
        message: String,
    },

    /// A detection entry point was called while the driver runs in a different mode.
    #[error("attempting to call `{operation}` while not using {expected:?} mode (driver uses {actual:?})")]
    ModeMismatch {
        operation: &'static str,
        expected: RunningMode,
        actual: RunningMode,
    },

    /// Live-stream mode was requested without a result listener to deliver results to.
    #[error("a result listener must be set when the running mode is LiveStream")]
    ListenerRequired,

    /// The driver has no engine handle (it was never built successfully, or it was closed).
    #[error("hand landmarker is not ready (state: {0:?})")]
    NotReady(crate::landmarker::State),

    /// An accelerator-backed engine was used from a thread other than the one that created it.
    #[error("GPU-delegated hand landmarker must be used from the thread that created it")]
    WrongThread,

    /// The classifier was given a degenerate contour or hull area.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A video frame or the video's metadata could not be read.
    #[error("frame unavailable: {0}")]
    FrameUnavailable(String),

    /// The engine did not produce a result for a frame.
    #[error("inference failed: {0}")]
    InferenceFailure(String),

    /// A configuration value is out of range or could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Returns the listener-visible [`ErrorCode`] for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::EngineInit {
                kind: InitErrorKind::DelegateUnsupported,
                ..
            } => ErrorCode::Gpu,
            _ => ErrorCode::Other,
        }
    }
}

/// Reason an engine handle could not be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitErrorKind {
    /// Generic failure (missing model asset, bad options, ...).
    Other,
    /// The selected hardware delegate cannot run the loaded model.
    DelegateUnsupported,
}

impl fmt::Display for InitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InitErrorKind::Other => "other",
            InitErrorKind::DelegateUnsupported => "delegate unsupported",
        })
    }
}

/// Error code passed to [`LandmarkerListener::on_error`][crate::listener::LandmarkerListener::on_error].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorCode {
    /// Any failure not caused by the hardware delegate.
    #[default]
    Other = 0,
    /// The GPU delegate is not supported by the model or device.
    Gpu = 1,
}
