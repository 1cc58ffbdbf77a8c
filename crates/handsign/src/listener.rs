//! Result and error callbacks.

use crate::{bundle::ResultBundle, error::ErrorCode};

/// Receives results and errors from a [`HandLandmarker`][crate::landmarker::HandLandmarker].
///
/// In live-stream mode, both methods are invoked from a dedicated delivery thread, one callback
/// at a time and in frame submission order (as far as the engine completes frames in order).
/// The image and video modes only use [`LandmarkerListener::on_error`], from the calling thread.
pub trait LandmarkerListener: Send + Sync {
    /// Called with the result of one live-stream frame.
    fn on_results(&self, bundle: ResultBundle);

    /// Called when initialization or inference fails.
    fn on_error(&self, message: &str, code: ErrorCode);
}
